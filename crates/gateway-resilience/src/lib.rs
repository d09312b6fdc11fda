//! # Gateway Resilience
//!
//! Store-backed resilience and state for the LLM State Gateway:
//! - Response cache keyed by prompt, model and caller
//! - Circuit breaker shared across instances through the store
//! - Sliding-window rate limiter per caller and endpoint
//! - Conversation context and activity tracking per caller
//! - An orchestrated chat flow composing all of the above
//!
//! Components never talk to each other; they share only a
//! [`store::KeyValueStore`] and the key namespace in [`keys`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod keys;
pub mod layer;
pub mod orchestrator;
pub mod rate_limiter;
pub mod session;
pub mod store;

// Re-export main types
pub use cache::{CacheKey, ResponseCache, ResponseCacheConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, CircuitStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use layer::{ResilienceConfig, ResilienceLayer};
pub use orchestrator::{ResilientGateway, DEFAULT_ENDPOINT, DEFAULT_SERVICE};
pub use rate_limiter::{MemberStrategy, RateLimitDecision, RateLimiterConfig, SlidingWindowRateLimiter};
pub use session::{SessionConfig, SessionStore};
pub use store::{sanitize_url, KeyValueStore, MemoryStore, RedisStore, StoreError, StoreResult};
