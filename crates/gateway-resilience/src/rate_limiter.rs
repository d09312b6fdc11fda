//! Sliding-window rate limiting over the shared store.
//!
//! Each (caller, endpoint) pair owns a sorted set at
//! `rate_limit:<caller>:<endpoint>` scored by request time. Before counting,
//! members older than the window are purged; the set's size after purge is
//! the authoritative request count.

use crate::clock::{Clock, SystemClock};
use crate::keys;
use crate::store::{admit_stepwise, degrade, KeyValueStore, ScoreBound, WindowAdmission};
use gateway_core::{FailureMode, GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// How window members are named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStrategy {
    /// Fractional timestamp plus a random suffix; every request counts
    #[default]
    Unique,
    /// Whole-second timestamp; requests within one second collapse into one
    Timestamp,
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Whether checks are enforced
    pub enabled: bool,
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
    /// Member naming
    pub member_strategy: MemberStrategy,
    /// Run purge-count-insert as one store-side operation
    pub atomic: bool,
    /// Behaviour on store failure
    pub failure_mode: FailureMode,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 10,
            window: Duration::from_secs(60),
            member_strategy: MemberStrategy::Unique,
            atomic: true,
            failure_mode: FailureMode::FailOpen,
        }
    }
}

/// Outcome of an admitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Requests in the window including this one
    pub count: u64,
    /// Configured limit
    pub limit: u32,
    /// Whether the store was consulted
    pub enforced: bool,
}

impl RateLimitDecision {
    /// Requests left in the current window
    #[must_use]
    pub fn remaining(&self) -> u64 {
        u64::from(self.limit).saturating_sub(self.count)
    }

    fn unenforced(limit: u32) -> Self {
        Self {
            count: 0,
            limit,
            enforced: false,
        }
    }
}

/// Sliding-window rate limiter
#[derive(Debug, Clone)]
pub struct SlidingWindowRateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: RateLimiterConfig,
}

impl SlidingWindowRateLimiter {
    /// Create a limiter over `store`
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: RateLimiterConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Create with default configuration on the system clock
    #[must_use]
    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, Arc::new(SystemClock), RateLimiterConfig::default())
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Admit or reject one request using the configured limit and window
    ///
    /// # Errors
    /// Returns `GatewayError::RateLimit` when the window is full
    pub async fn check_and_consume(
        &self,
        caller: &str,
        endpoint: &str,
    ) -> GatewayResult<RateLimitDecision> {
        self.check_and_consume_with(caller, endpoint, self.config.max_requests, self.config.window)
            .await
    }

    /// Admit or reject one request against an explicit limit and window
    ///
    /// # Errors
    /// Returns `GatewayError::RateLimit` when the window is full
    pub async fn check_and_consume_with(
        &self,
        caller: &str,
        endpoint: &str,
        max_requests: u32,
        window: Duration,
    ) -> GatewayResult<RateLimitDecision> {
        if !self.config.enabled {
            return Ok(RateLimitDecision::unenforced(max_requests));
        }

        let key = keys::rate_limit(caller, endpoint);
        let (score, member) = self.next_member();
        let admission = WindowAdmission {
            key: &key,
            member: &member,
            now: score,
            window,
            max_requests,
        };

        let result = if self.config.atomic {
            self.store.sliding_window_admit(&admission).await
        } else {
            admit_stepwise(self.store.as_ref(), &admission).await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                return degrade(
                    self.config.failure_mode,
                    "rate_limiter",
                    "check_and_consume",
                    e,
                    RateLimitDecision::unenforced(max_requests),
                )
            }
        };

        if !outcome.admitted {
            warn!(
                caller = %caller,
                endpoint = %endpoint,
                count = outcome.count,
                max_requests,
                window_secs = window.as_secs(),
                "Rate limit exceeded"
            );
            return Err(GatewayError::rate_limit(max_requests, window));
        }

        debug!(
            caller = %caller,
            endpoint = %endpoint,
            count = outcome.count,
            max_requests,
            "Request admitted"
        );
        Ok(RateLimitDecision {
            count: outcome.count,
            limit: max_requests,
            enforced: true,
        })
    }

    /// Requests currently counted in the window, after purging stale ones
    pub async fn usage(&self, caller: &str, endpoint: &str) -> GatewayResult<u64> {
        let key = keys::rate_limit(caller, endpoint);
        let window_start = self.clock.unix_seconds_f64() - self.config.window.as_secs_f64();

        if let Err(e) = self
            .store
            .zrem_range_by_score(&key, ScoreBound::NegInfinity, ScoreBound::Exclusive(window_start))
            .await
        {
            return degrade(self.config.failure_mode, "rate_limiter", "usage", e, 0);
        }
        match self.store.zcard(&key).await {
            Ok(count) => Ok(count),
            Err(e) => degrade(self.config.failure_mode, "rate_limiter", "usage", e, 0),
        }
    }

    /// Drop the window for a caller and endpoint
    pub async fn reset(&self, caller: &str, endpoint: &str) -> GatewayResult<bool> {
        match self.store.delete(&keys::rate_limit(caller, endpoint)).await {
            Ok(existed) => Ok(existed),
            Err(e) => degrade(self.config.failure_mode, "rate_limiter", "reset", e, false),
        }
    }

    fn next_member(&self) -> (f64, String) {
        let now = self.clock.now();
        match self.config.member_strategy {
            MemberStrategy::Timestamp => {
                let secs = now.as_secs();
                (secs as f64, secs.to_string())
            }
            MemberStrategy::Unique => {
                let secs = now.as_secs_f64();
                (secs, format!("{secs}-{}", Uuid::new_v4().simple()))
            }
        }
    }
}
