//! Store key namespace.
//!
//! All keys follow `<domain>:<identity>[:<field>]`. Nothing outside this
//! module formats a store key.

/// Prefix for cached responses
pub const CACHE_PREFIX: &str = "llm_cache";
/// Prefix for circuit breaker records
pub const CIRCUIT_PREFIX: &str = "circuit";
/// Prefix for rate limit windows
pub const RATE_LIMIT_PREFIX: &str = "rate_limit";
/// Prefix for conversation histories
pub const SESSION_PREFIX: &str = "session";
/// Prefix for liveness markers
pub const ACTIVITY_PREFIX: &str = "activity";

/// `llm_cache:<hash>`
#[must_use]
pub fn cache(hash: &str) -> String {
    format!("{CACHE_PREFIX}:{hash}")
}

/// `circuit:<service>:state`
#[must_use]
pub fn circuit_state(service: &str) -> String {
    format!("{CIRCUIT_PREFIX}:{service}:state")
}

/// `circuit:<service>:failures`
#[must_use]
pub fn circuit_failures(service: &str) -> String {
    format!("{CIRCUIT_PREFIX}:{service}:failures")
}

/// `circuit:<service>:last_failure`
#[must_use]
pub fn circuit_last_failure(service: &str) -> String {
    format!("{CIRCUIT_PREFIX}:{service}:last_failure")
}

/// `rate_limit:<caller>:<endpoint>`
///
/// Segments are joined without escaping, so a caller containing `:` can
/// alias another (caller, endpoint) pair: `("a:b", "c")` and `("a", "b:c")`
/// share a window. `ChatRequest::validate` rejects such callers before they
/// reach the limiter.
#[must_use]
pub fn rate_limit(caller: &str, endpoint: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}:{caller}:{endpoint}")
}

/// `session:<caller>`
#[must_use]
pub fn session(caller: &str) -> String {
    format!("{SESSION_PREFIX}:{caller}")
}

/// `activity:<caller>`
#[must_use]
pub fn activity(caller: &str) -> String {
    format!("{ACTIVITY_PREFIX}:{caller}")
}
