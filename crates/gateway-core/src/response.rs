//! Chat response type returned by the orchestrated gateway operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Completed chat exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Unique response identifier
    pub id: Uuid,
    /// Caller that issued the request
    pub caller_id: String,
    /// Prompt as received
    pub prompt: String,
    /// Generated text
    pub response: String,
    /// Model that produced the text
    pub model: String,
    /// Time the response was assembled
    pub timestamp: DateTime<Utc>,
    /// Whether the text came from the response cache
    #[serde(default)]
    pub cached: bool,
}

impl ChatResponse {
    /// Build a fresh response stamped with a new id and the current time
    #[must_use]
    pub fn new(
        caller_id: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
        model: impl Into<String>,
        cached: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            caller_id: caller_id.into(),
            prompt: prompt.into(),
            response: response.into(),
            model: model.into(),
            timestamp: Utc::now(),
            cached,
        }
    }
}
