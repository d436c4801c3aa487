pub mod app;
pub mod config;
pub mod embed;
pub mod error;
pub mod forward;
pub mod origin;
pub mod rate_limit;
pub mod sanitize;
