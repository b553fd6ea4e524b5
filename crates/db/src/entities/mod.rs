pub mod activity_log;
pub mod subtask;
pub mod task;
pub mod user;
