//! CLI commands module.

pub mod cache;
pub mod circuit;
pub mod config;
pub mod health;
pub mod rate_limit;
pub mod session;
