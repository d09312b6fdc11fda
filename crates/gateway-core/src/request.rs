//! Chat request type accepted by the orchestrated gateway operation.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};

/// Model used when a request does not name one
pub const DEFAULT_MODEL: &str = "default";

/// Separator of store key segments, not allowed inside a caller id
pub const KEY_SEPARATOR: char = ':';

/// Incoming chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Opaque caller identifier used for rate limiting and session keys
    #[serde(alias = "userId")]
    pub caller_id: String,

    /// Prompt text
    pub prompt: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl ChatRequest {
    /// Create a request against the default model
    #[must_use]
    pub fn new(caller_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            prompt: prompt.into(),
            model: default_model(),
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validate the request
    ///
    /// # Errors
    /// Returns `GatewayError::Validation` when a required field is blank or
    /// the caller id contains [`KEY_SEPARATOR`]
    pub fn validate(&self) -> GatewayResult<()> {
        if self.caller_id.trim().is_empty() {
            return Err(GatewayError::validation(
                "caller id must not be empty",
                Some("callerId"),
            ));
        }
        if self.caller_id.contains(KEY_SEPARATOR) {
            return Err(GatewayError::validation(
                format!("caller id must not contain '{KEY_SEPARATOR}'"),
                Some("callerId"),
            ));
        }
        if self.prompt.is_empty() {
            return Err(GatewayError::validation(
                "prompt must not be empty",
                Some("prompt"),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(GatewayError::validation(
                "model must not be empty",
                Some("model"),
            ));
        }
        Ok(())
    }
}
