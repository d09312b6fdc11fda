//! Upstream text generation seam.
//!
//! The state layer never talks to a model vendor directly. It calls whatever
//! implements [`TextGenerator`] and treats every error as a breaker failure.

use crate::error::GatewayResult;
use crate::types::ChatTurn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Output of a single upstream call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text
    pub content: String,
    /// Model that actually served the call
    pub model: String,
}

impl Generation {
    /// Create a generation result
    #[must_use]
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
        }
    }
}

/// Upstream text generator
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    /// Name used for logging and for the circuit breaker service key
    fn name(&self) -> &str;

    /// Produce a reply to `prompt` given the prior conversation
    ///
    /// # Errors
    /// Returns `GatewayError::Upstream` (or any other variant) on failure
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        context: &[ChatTurn],
    ) -> GatewayResult<Generation>;
}
