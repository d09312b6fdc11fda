//! Bundle of the state components over one injected store.

use crate::cache::{ResponseCache, ResponseCacheConfig};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::clock::{Clock, SystemClock};
use crate::rate_limiter::{RateLimiterConfig, SlidingWindowRateLimiter};
use crate::session::{SessionConfig, SessionStore};
use crate::store::KeyValueStore;
use gateway_core::{FailureMode, GatewayResult};
use std::sync::Arc;

/// Configuration for every component of the layer
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    /// Response cache settings
    pub cache: ResponseCacheConfig,
    /// Circuit breaker settings, shared by every service
    pub circuit_breaker: CircuitBreakerConfig,
    /// Rate limiter settings
    pub rate_limiter: RateLimiterConfig,
    /// Session settings
    pub session: SessionConfig,
}

impl ResilienceConfig {
    /// Apply one failure mode to every component
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.cache.failure_mode = mode;
        self.circuit_breaker.failure_mode = mode;
        self.rate_limiter.failure_mode = mode;
        self.session.failure_mode = mode;
        self
    }
}

/// Cache, rate limiter, sessions and breakers sharing one store and clock
#[derive(Debug, Clone)]
pub struct ResilienceLayer {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    cache: ResponseCache,
    rate_limiter: SlidingWindowRateLimiter,
    sessions: SessionStore,
    breaker_config: CircuitBreakerConfig,
}

impl ResilienceLayer {
    /// Build every component over `store`
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: ResilienceConfig,
    ) -> Self {
        Self {
            cache: ResponseCache::new(store.clone(), config.cache),
            rate_limiter: SlidingWindowRateLimiter::new(
                store.clone(),
                clock.clone(),
                config.rate_limiter,
            ),
            sessions: SessionStore::new(store.clone(), config.session),
            breaker_config: config.circuit_breaker,
            store,
            clock,
        }
    }

    /// Build with defaults on the system clock
    #[must_use]
    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, Arc::new(SystemClock), ResilienceConfig::default())
    }

    /// Response cache
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Rate limiter
    #[must_use]
    pub fn rate_limiter(&self) -> &SlidingWindowRateLimiter {
        &self.rate_limiter
    }

    /// Session store
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Circuit breaker for a named service
    #[must_use]
    pub fn breaker(&self, service: impl Into<String>) -> CircuitBreaker {
        CircuitBreaker::new(
            service,
            self.store.clone(),
            self.clock.clone(),
            self.breaker_config.clone(),
        )
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Time source
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Ping the store
    pub async fn health_check(&self) -> GatewayResult<()> {
        self.store.ping().await.map_err(Into::into)
    }
}
