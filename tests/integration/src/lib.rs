//! Integration tests for the LLM State Gateway
//!
//! Scenario tests across crates, run against the in-memory store with a
//! simulated clock:
//! - Response caching
//! - Circuit breaking shared between gateway instances
//! - Sliding-window rate limiting
//! - Conversation context
//! - Fail-open and fail-closed behaviour during store outages
//! - End-to-end request flows and configuration wiring
//!
//! `redis_tests` repeat the core scenarios against a live server and are
//! ignored unless run with `--ignored` and `REDIS_URL` set.

pub mod fixtures;
pub mod mock_providers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_providers::*;

#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod rate_limit_tests;
#[cfg(test)]
mod redis_tests;
