pub mod activities;
pub mod auth;
pub mod health;
pub mod leads;
pub mod socket;
pub mod subtasks;
pub mod tasks;
pub mod view;
