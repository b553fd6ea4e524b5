pub mod activity;
pub mod subtask;
pub mod task;
pub mod user;
