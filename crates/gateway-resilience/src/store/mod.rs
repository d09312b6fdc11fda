//! Shared key-value store abstraction.
//!
//! Every piece of state the gateway keeps lives behind [`KeyValueStore`]:
//! - [`RedisStore`] for multi-instance deployments
//! - [`MemoryStore`] for tests and single-process runs
//!
//! Each primitive is atomic on its own. [`KeyValueStore::sliding_window_admit`]
//! is the only composite operation; backends that can run it atomically
//! override the default.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::{sanitize_url, RedisStore};

use async_trait::async_trait;
use gateway_core::{FailureMode, GatewayError, GatewayResult};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Error types for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not establish a connection
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Operation did not finish in time
    #[error("Store operation timeout after {0:?}")]
    Timeout(Duration),

    /// Backend is not reachable
    #[error("Store not available: {0}")]
    Unavailable(String),

    /// Backend rejected the command
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Key holds a value of another type
    #[error("Wrong value type stored at {key}")]
    WrongType {
        /// Offending key
        key: String,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

/// Apply a component's failure mode to a store error.
///
/// Fail-open logs and yields `fallback`; fail-closed surfaces the error.
pub(crate) fn degrade<T>(
    mode: FailureMode,
    component: &str,
    operation: &str,
    err: StoreError,
    fallback: T,
) -> GatewayResult<T> {
    if mode.is_fail_open() {
        error!(
            component = %component,
            operation = %operation,
            error = %err,
            "Store operation failed, continuing with fallback"
        );
        Ok(fallback)
    } else {
        Err(err.into())
    }
}

/// Score bound for sorted-set range removal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// No lower limit
    NegInfinity,
    /// No upper limit
    PosInfinity,
    /// Bound that includes the value
    Inclusive(f64),
    /// Bound that excludes the value
    Exclusive(f64),
}

impl ScoreBound {
    /// Whether `score` satisfies this bound used as a range minimum
    #[must_use]
    pub fn admits_from_below(self, score: f64) -> bool {
        match self {
            Self::NegInfinity => true,
            Self::PosInfinity => false,
            Self::Inclusive(min) => score >= min,
            Self::Exclusive(min) => score > min,
        }
    }

    /// Whether `score` satisfies this bound used as a range maximum
    #[must_use]
    pub fn admits_from_above(self, score: f64) -> bool {
        match self {
            Self::NegInfinity => false,
            Self::PosInfinity => true,
            Self::Inclusive(max) => score <= max,
            Self::Exclusive(max) => score < max,
        }
    }
}

impl fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegInfinity => write!(f, "-inf"),
            Self::PosInfinity => write!(f, "+inf"),
            Self::Inclusive(value) => write!(f, "{value}"),
            Self::Exclusive(value) => write!(f, "({value}"),
        }
    }
}

/// One sliding-window admission attempt
#[derive(Debug, Clone)]
pub struct WindowAdmission<'a> {
    /// Window set key
    pub key: &'a str,
    /// Member to insert when admitted
    pub member: &'a str,
    /// Score to insert (current time in unix seconds)
    pub now: f64,
    /// Window length
    pub window: Duration,
    /// Maximum members allowed after purge
    pub max_requests: u32,
}

impl WindowAdmission<'_> {
    /// Lowest score still inside the window
    #[must_use]
    pub fn window_start(&self) -> f64 {
        self.now - self.window.as_secs_f64()
    }

    /// TTL applied to the set on admission, never below one second
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.window.max(Duration::from_secs(1))
    }
}

/// Result of a sliding-window admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Whether the request was admitted
    pub admitted: bool,
    /// Members in the window after the attempt
    pub count: u64,
}

/// Key-value store with TTLs and sorted sets
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Get a string value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a string value, replacing any previous value and TTL
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Increment an integer value, creating it at zero first
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Set the TTL of an existing key, returning whether it existed
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Add or update a sorted-set member
    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Remove sorted-set members whose score falls in `[min, max]`
    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> StoreResult<u64>;

    /// Number of members in a sorted set
    async fn zcard(&self, key: &str) -> StoreResult<u64>;

    /// Check that the backend answers
    async fn ping(&self) -> StoreResult<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Whether state is shared across processes
    fn is_distributed(&self) -> bool;

    /// Purge expired members, count, and insert when below the limit.
    ///
    /// The default runs [`admit_stepwise`]; backends that can execute the
    /// sequence atomically override it.
    async fn sliding_window_admit(
        &self,
        admission: &WindowAdmission<'_>,
    ) -> StoreResult<WindowOutcome> {
        admit_stepwise(self, admission).await
    }
}

/// Sliding-window admission from separate primitives.
///
/// Concurrent callers may interleave between count and insert, which can
/// over-admit by up to the number of in-flight requests minus one.
pub async fn admit_stepwise<S: KeyValueStore + ?Sized>(
    store: &S,
    admission: &WindowAdmission<'_>,
) -> StoreResult<WindowOutcome> {
    store
        .zrem_range_by_score(
            admission.key,
            ScoreBound::NegInfinity,
            ScoreBound::Exclusive(admission.window_start()),
        )
        .await?;

    let count = store.zcard(admission.key).await?;
    if count >= u64::from(admission.max_requests) {
        return Ok(WindowOutcome {
            admitted: false,
            count,
        });
    }

    store
        .zadd(admission.key, admission.member, admission.now)
        .await?;
    store.expire(admission.key, admission.ttl()).await?;

    Ok(WindowOutcome {
        admitted: true,
        count: count + 1,
    })
}
