pub mod activity;
pub mod auth;
pub mod config;
pub mod rate_limit;
pub mod task;
pub mod uptime;
