//! Error types and handling for the gateway.
//!
//! Every failure the state layer can surface maps to an HTTP status code and
//! a structured error body, so a front end can forward it unchanged.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type covering the state layer and its upstream seam
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Field that failed validation (if applicable)
        field: Option<String>,
    },

    /// Caller exceeded its sliding-window quota
    #[error(
        "Rate limit exceeded. Max {max_requests} requests per {} seconds",
        .window.as_secs()
    )]
    RateLimit {
        /// Maximum number of requests admitted per window
        max_requests: u32,
        /// Window length
        window: Duration,
    },

    /// Circuit breaker is open for the named service
    #[error("Service temporarily unavailable: circuit open for {service}")]
    CircuitBreakerOpen {
        /// Service whose circuit is open
        service: String,
    },

    /// Shared store could not be reached (strict failure mode only)
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Error message
        message: String,
    },

    /// Upstream text generation failed
    #[error("Upstream error: {provider} - {message}")]
    Upstream {
        /// Provider that failed
        provider: String,
        /// Error message
        message: String,
    },

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal server error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::CircuitBreakerOpen { .. } | Self::StoreUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Serialization { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error type string for API responses
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request_error",
            Self::RateLimit { .. } => "rate_limit_error",
            Self::CircuitBreakerOpen { .. } | Self::StoreUnavailable { .. } => {
                "service_unavailable_error"
            }
            Self::Upstream { .. } => "provider_error",
            Self::Serialization { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "internal_error"
            }
        }
    }

    /// Get the error code for programmatic handling
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request",
            Self::RateLimit { .. } => "rate_limit_exceeded",
            Self::CircuitBreakerOpen { .. } => "circuit_breaker_open",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Upstream { .. } => "upstream_error",
            Self::Serialization { .. } => "serialization_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Seconds a client should wait before retrying, when known
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { window, .. } => Some(*window),
            _ => None,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(ToString::to_string),
        }
    }

    /// Create a rate limit error
    #[must_use]
    pub fn rate_limit(max_requests: u32, window: Duration) -> Self {
        Self::RateLimit {
            max_requests,
            window,
        }
    }

    /// Create a circuit breaker open error
    #[must_use]
    pub fn circuit_breaker_open(service: impl Into<String>) -> Self {
        Self::CircuitBreakerOpen {
            service: service.into(),
        }
    }

    /// Create a store unavailable error
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create an upstream error
    #[must_use]
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// API error response format (OpenAI compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details
    pub error: ApiError,
}

/// API error details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Parameter that caused the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl From<&GatewayError> for ApiErrorResponse {
    fn from(err: &GatewayError) -> Self {
        let param = match err {
            GatewayError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        Self {
            error: ApiError {
                error_type: err.error_type().to_string(),
                message: err.to_string(),
                code: Some(err.error_code().to_string()),
                param,
            },
        }
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error.message)
    }
}
