//! # Gateway Configuration
//!
//! Configuration for the LLM State Gateway:
//! - Schema with validation and defaults for every state component
//! - Loading from YAML, TOML or JSON files and raw strings
//! - `${VAR}` / `${VAR:-default}` substitution and prefixed environment overrides

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

// Re-export main types
pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource, ENV_PREFIX};
pub use schema::{
    CacheConfig, CircuitBreakerConfig, GatewayConfig, RateLimitConfig, SessionConfig,
    StoreConfig,
};
