//! Circuit breaker pattern implementation over the shared store.
//!
//! The circuit breaker prevents cascading failures by stopping requests
//! to a failing service and allowing it time to recover. State lives in the
//! store under `circuit:<service>:{state,failures,last_failure}` so every
//! gateway instance sees the same circuit.
//!
//! There is no background timer: the OPEN to HALF_OPEN transition happens
//! lazily on the first [`CircuitBreaker::state`] read after the recovery
//! timeout.

use crate::clock::{Clock, SystemClock};
use crate::keys;
use crate::store::{degrade, KeyValueStore, StoreError};
use gateway_core::{FailureMode, GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, a probe may test whether the service recovered
    HalfOpen,
}

impl CircuitState {
    /// Stored representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Parse the stored representation
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "closed" => Some(Self::Closed),
            "open" => Some(Self::Open),
            "half_open" => Some(Self::HalfOpen),
            _ => None,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures within the window before opening the circuit
    pub failure_threshold: u32,
    /// Time an open circuit waits before allowing a probe
    pub recovery_timeout: Duration,
    /// Rolling TTL of the failure counter
    pub failure_window: Duration,
    /// Behaviour on store failure
    pub failure_mode: FailureMode,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            failure_window: Duration::from_secs(300),
            failure_mode: FailureMode::FailOpen,
        }
    }
}

/// Snapshot of a circuit's stored record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStats {
    /// Service name
    pub service: String,
    /// Effective state
    pub state: CircuitState,
    /// Failures counted in the current window
    pub failures: u64,
    /// Unix time of the last transition to OPEN
    pub last_failure: Option<f64>,
}

/// Circuit breaker for a single named service
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    service: String,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            service: service.into(),
            store,
            clock,
            config,
        }
    }

    /// Create with default configuration on the system clock
    #[must_use]
    pub fn with_defaults(service: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(
            service,
            store,
            Arc::new(SystemClock),
            CircuitBreakerConfig::default(),
        )
    }

    /// Service name
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, applying the lazy OPEN to HALF_OPEN transition.
    ///
    /// An OPEN record without a readable `last_failure` is treated as
    /// expired so a probe can heal it.
    pub async fn state(&self) -> GatewayResult<CircuitState> {
        let state = self.stored_state().await?;
        if state != CircuitState::Open {
            return Ok(state);
        }

        let last_failure = match self
            .store
            .get(&keys::circuit_last_failure(&self.service))
            .await
        {
            Ok(raw) => raw.and_then(|raw| raw.parse::<f64>().ok()),
            Err(e) => return self.on_store_error("state", e, CircuitState::Closed),
        };

        let recovered = last_failure.map_or(true, |opened_at| {
            self.clock.unix_seconds_f64() - opened_at > self.config.recovery_timeout.as_secs_f64()
        });
        if !recovered {
            return Ok(CircuitState::Open);
        }

        if let Err(e) = self
            .write_state(CircuitState::HalfOpen)
            .await
        {
            self.on_store_error("half_open", e, ())?;
        }
        info!(service = %self.service, "Circuit breaker half-open, allowing probe");
        Ok(CircuitState::HalfOpen)
    }

    /// Check whether a call may proceed
    ///
    /// # Errors
    /// Returns `GatewayError::CircuitBreakerOpen` while the circuit is open
    pub async fn check(&self) -> GatewayResult<CircuitState> {
        match self.state().await? {
            CircuitState::Open => {
                debug!(service = %self.service, "Circuit breaker rejected call");
                Err(GatewayError::circuit_breaker_open(&self.service))
            }
            state => Ok(state),
        }
    }

    /// Record a successful call: close the circuit and clear the counter
    pub async fn record_success(&self) -> GatewayResult<()> {
        if let Err(e) = self.write_state(CircuitState::Closed).await {
            return self.on_store_error("record_success", e, ());
        }
        if let Err(e) = self
            .store
            .delete(&keys::circuit_failures(&self.service))
            .await
        {
            return self.on_store_error("record_success", e, ());
        }
        debug!(service = %self.service, "Circuit breaker recorded success");
        Ok(())
    }

    /// Record a failed call and return the resulting state.
    ///
    /// Opens the circuit once the counter reaches the threshold. A failure
    /// while HALF_OPEN re-opens immediately.
    pub async fn record_failure(&self) -> GatewayResult<CircuitState> {
        let failures_key = keys::circuit_failures(&self.service);

        let failures = match self.store.incr(&failures_key).await {
            Ok(count) => count,
            Err(e) => return self.on_store_error("record_failure", e, CircuitState::Closed),
        };
        if let Err(e) = self
            .store
            .expire(&failures_key, self.config.failure_window)
            .await
        {
            self.on_store_error("record_failure", e, ())?;
        }

        let current = self.stored_state().await?;
        let threshold_reached = failures >= i64::from(self.config.failure_threshold);

        if current == CircuitState::HalfOpen || threshold_reached {
            self.open().await?;
            warn!(
                service = %self.service,
                failures,
                threshold = self.config.failure_threshold,
                probe_failed = current == CircuitState::HalfOpen,
                "Circuit breaker opened"
            );
            return Ok(CircuitState::Open);
        }

        debug!(
            service = %self.service,
            failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker recorded failure"
        );
        Ok(current)
    }

    /// Force the circuit open and stamp the failure time
    pub async fn force_open(&self) -> GatewayResult<()> {
        self.open().await?;
        warn!(service = %self.service, "Circuit breaker forced open");
        Ok(())
    }

    /// Remove the circuit record entirely
    pub async fn reset(&self) -> GatewayResult<()> {
        for key in [
            keys::circuit_state(&self.service),
            keys::circuit_failures(&self.service),
            keys::circuit_last_failure(&self.service),
        ] {
            if let Err(e) = self.store.delete(&key).await {
                return self.on_store_error("reset", e, ());
            }
        }
        info!(service = %self.service, "Circuit breaker reset");
        Ok(())
    }

    /// Snapshot of the stored record
    pub async fn stats(&self) -> GatewayResult<CircuitStats> {
        let state = self.state().await?;

        let failures = match self
            .store
            .get(&keys::circuit_failures(&self.service))
            .await
        {
            Ok(raw) => raw.and_then(|raw| raw.parse::<u64>().ok()).unwrap_or(0),
            Err(e) => self.on_store_error("stats", e, 0)?,
        };
        let last_failure = match self
            .store
            .get(&keys::circuit_last_failure(&self.service))
            .await
        {
            Ok(raw) => raw.and_then(|raw| raw.parse::<f64>().ok()),
            Err(e) => self.on_store_error("stats", e, None)?,
        };

        Ok(CircuitStats {
            service: self.service.clone(),
            state,
            failures,
            last_failure,
        })
    }

    /// Stored state without any transition; absent or unknown means CLOSED
    async fn stored_state(&self) -> GatewayResult<CircuitState> {
        match self.store.get(&keys::circuit_state(&self.service)).await {
            Ok(Some(raw)) => Ok(CircuitState::parse(&raw).unwrap_or_else(|| {
                warn!(service = %self.service, value = %raw, "Unknown circuit state, treating as closed");
                CircuitState::Closed
            })),
            Ok(None) => Ok(CircuitState::Closed),
            Err(e) => self.on_store_error("state", e, CircuitState::Closed),
        }
    }

    async fn open(&self) -> GatewayResult<()> {
        if let Err(e) = self.write_state(CircuitState::Open).await {
            return self.on_store_error("open", e, ());
        }
        let stamp = self.clock.unix_seconds_f64().to_string();
        if let Err(e) = self
            .store
            .set(&keys::circuit_last_failure(&self.service), &stamp, None)
            .await
        {
            return self.on_store_error("open", e, ());
        }
        Ok(())
    }

    async fn write_state(&self, state: CircuitState) -> Result<(), StoreError> {
        self.store
            .set(&keys::circuit_state(&self.service), state.as_str(), None)
            .await
    }

    fn on_store_error<T>(&self, operation: &str, err: StoreError, fallback: T) -> GatewayResult<T> {
        degrade(
            self.config.failure_mode,
            "circuit_breaker",
            operation,
            err,
            fallback,
        )
    }
}
