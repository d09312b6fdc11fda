//! Configuration schema definitions.
//!
//! Every section deserializes with defaults, so a file only needs the
//! values it changes. Durations use humantime notation (`90s`, `2h`).

use gateway_core::FailureMode;
use gateway_resilience::{
    CircuitBreakerConfig as BreakerSettings, MemberStrategy, RateLimiterConfig,
    ResilienceConfig, ResponseCacheConfig, SessionConfig as SessionSettings, DEFAULT_ENDPOINT,
    DEFAULT_SERVICE,
};
use gateway_telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Shared key-value store
    #[validate(nested)]
    pub store: StoreConfig,
    /// Response cache
    #[validate(nested)]
    pub cache: CacheConfig,
    /// Circuit breaker
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Rate limiting
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    /// Conversation context
    #[validate(nested)]
    pub session: SessionConfig,
    /// Default behaviour of every component when the store is unreachable
    pub failure_mode: FailureMode,
    /// Logging
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns validation errors if configuration is invalid
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()
    }

    /// Runtime settings for the resilience layer
    #[must_use]
    pub fn to_resilience_config(&self) -> ResilienceConfig {
        let global = self.failure_mode;
        ResilienceConfig {
            cache: ResponseCacheConfig {
                enabled: self.cache.enabled,
                default_ttl: self.cache.default_ttl,
                per_caller: self.cache.per_caller,
                failure_mode: self.cache.failure_mode.unwrap_or(global),
            },
            circuit_breaker: BreakerSettings {
                failure_threshold: self.circuit_breaker.failure_threshold,
                recovery_timeout: self.circuit_breaker.recovery_timeout,
                failure_window: self.circuit_breaker.failure_window,
                failure_mode: self.circuit_breaker.failure_mode.unwrap_or(global),
            },
            rate_limiter: RateLimiterConfig {
                enabled: self.rate_limit.enabled,
                max_requests: self.rate_limit.max_requests,
                window: self.rate_limit.window,
                member_strategy: self.rate_limit.member_strategy,
                atomic: self.rate_limit.atomic,
                failure_mode: self.rate_limit.failure_mode.unwrap_or(global),
            },
            session: SessionSettings {
                context_ttl: self.session.context_ttl,
                activity_ttl: self.session.activity_ttl,
                max_history_turns: self.session.max_history_turns,
                failure_mode: self.session.failure_mode.unwrap_or(global),
            },
        }
    }
}

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis URL (`redis://`, `rediss://` or `unix://`)
    #[validate(custom(function = "validate_store_url"))]
    pub url: String,
    /// Time allowed to establish the connection
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub connect_timeout: Duration,
    /// Time allowed for a single store operation
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub operation_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_millis(250),
        }
    }
}

/// Response cache section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable caching
    pub enabled: bool,
    /// TTL of stored responses
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub default_ttl: Duration,
    /// Include the caller in cache keys
    pub per_caller: bool,
    /// Overrides the global failure mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let runtime = ResponseCacheConfig::default();
        Self {
            enabled: runtime.enabled,
            default_ttl: runtime.default_ttl,
            per_caller: runtime.per_caller,
            failure_mode: None,
        }
    }
}

/// Circuit breaker section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Name of the guarded upstream
    #[validate(length(min = 1))]
    pub service: String,
    /// Failures before opening
    #[validate(range(min = 1))]
    pub failure_threshold: u32,
    /// Time before an open circuit admits a probe
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub recovery_timeout: Duration,
    /// Rolling TTL of the failure counter
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub failure_window: Duration,
    /// Overrides the global failure mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        let runtime = BreakerSettings::default();
        Self {
            service: DEFAULT_SERVICE.to_string(),
            failure_threshold: runtime.failure_threshold,
            recovery_timeout: runtime.recovery_timeout,
            failure_window: runtime.failure_window,
            failure_mode: None,
        }
    }
}

/// Rate limiting section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Endpoint label the gateway counts against
    #[validate(length(min = 1))]
    pub endpoint: String,
    /// Requests admitted per window
    #[validate(range(min = 1))]
    pub max_requests: u32,
    /// Window length
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub window: Duration,
    /// How window members are named
    pub member_strategy: MemberStrategy,
    /// Use the store-side atomic admission
    pub atomic: bool,
    /// Overrides the global failure mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let runtime = RateLimiterConfig::default();
        Self {
            enabled: runtime.enabled,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_requests: runtime.max_requests,
            window: runtime.window,
            member_strategy: runtime.member_strategy,
            atomic: runtime.atomic,
            failure_mode: None,
        }
    }
}

/// Conversation context section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SessionConfig {
    /// TTL of stored history
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub context_ttl: Duration,
    /// TTL of the activity marker
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub activity_ttl: Duration,
    /// Most recent turns kept; absent keeps everything
    #[validate(range(min = 1))]
    pub max_history_turns: Option<usize>,
    /// Overrides the global failure mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let runtime = SessionSettings::default();
        Self {
            context_ttl: runtime.context_ttl,
            activity_ttl: runtime.activity_ttl,
            max_history_turns: runtime.max_history_turns,
            failure_mode: None,
        }
    }
}

fn non_zero_duration(value: &Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::new("zero_duration"));
    }
    Ok(())
}

fn validate_store_url(value: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(value).map_err(|_| ValidationError::new("invalid_url"))?;
    match parsed.scheme() {
        "redis" | "rediss" | "unix" | "redis+unix" => Ok(()),
        _ => Err(ValidationError::new("unsupported_scheme")),
    }
}
