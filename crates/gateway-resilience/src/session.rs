//! Per-caller conversation context.
//!
//! Two independent expiring entries per caller:
//! - `session:<caller>`: JSON array of turns, replaced wholesale on save
//! - `activity:<caller>`: liveness marker refreshed on every interaction

use crate::keys;
use crate::store::{degrade, KeyValueStore};
use gateway_core::{ChatTurn, FailureMode, GatewayResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ACTIVE_MARKER: &str = "active";

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// TTL of the conversation history
    pub context_ttl: Duration,
    /// TTL of the liveness marker
    pub activity_ttl: Duration,
    /// Keep only this many most recent turns; `None` keeps everything
    pub max_history_turns: Option<usize>,
    /// Behaviour on store failure
    pub failure_mode: FailureMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_ttl: Duration::from_secs(7200),
            activity_ttl: Duration::from_secs(1800),
            max_history_turns: Some(50),
            failure_mode: FailureMode::FailOpen,
        }
    }
}

/// Conversation history and activity tracking
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    config: SessionConfig,
}

impl SessionStore {
    /// Create a session store over `store`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, SessionConfig::default())
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the caller's history
    pub async fn save_context(
        &self,
        caller: &str,
        history: &[ChatTurn],
        ttl: Option<Duration>,
    ) -> GatewayResult<()> {
        let history = match self.config.max_history_turns {
            Some(cap) if history.len() > cap => {
                debug!(
                    caller = %caller,
                    turns = history.len(),
                    cap,
                    "Truncating conversation history"
                );
                &history[history.len() - cap..]
            }
            _ => history,
        };

        let value = serde_json::to_string(history)?;
        let ttl = ttl.unwrap_or(self.config.context_ttl);
        match self.store.set(&keys::session(caller), &value, Some(ttl)).await {
            Ok(()) => Ok(()),
            Err(e) => degrade(self.config.failure_mode, "session", "save_context", e, ()),
        }
    }

    /// The caller's history, empty when absent, expired or unreadable
    pub async fn get_context(&self, caller: &str) -> GatewayResult<Vec<ChatTurn>> {
        let raw = match self.store.get(&keys::session(caller)).await {
            Ok(raw) => raw,
            Err(e) => {
                return degrade(
                    self.config.failure_mode,
                    "session",
                    "get_context",
                    e,
                    Vec::new(),
                )
            }
        };

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(history) => Ok(history),
            Err(e) => {
                warn!(caller = %caller, error = %e, "Discarding undecodable session history");
                Ok(Vec::new())
            }
        }
    }

    /// Append one user/assistant exchange to the caller's history
    pub async fn append_exchange(
        &self,
        caller: &str,
        prompt: &str,
        reply: &str,
    ) -> GatewayResult<()> {
        let mut history = self.get_context(caller).await?;
        history.push(ChatTurn::user(prompt));
        history.push(ChatTurn::assistant(reply));
        self.save_context(caller, &history, None).await
    }

    /// Refresh the caller's liveness marker
    pub async fn touch_activity(&self, caller: &str) -> GatewayResult<()> {
        match self
            .store
            .set(
                &keys::activity(caller),
                ACTIVE_MARKER,
                Some(self.config.activity_ttl),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => degrade(self.config.failure_mode, "session", "touch_activity", e, ()),
        }
    }

    /// Whether the caller interacted within the activity TTL
    pub async fn is_active(&self, caller: &str) -> GatewayResult<bool> {
        match self.store.get(&keys::activity(caller)).await {
            Ok(marker) => Ok(marker.is_some()),
            Err(e) => degrade(self.config.failure_mode, "session", "is_active", e, false),
        }
    }

    /// Remove history and liveness marker
    pub async fn clear(&self, caller: &str) -> GatewayResult<()> {
        for key in [keys::session(caller), keys::activity(caller)] {
            if let Err(e) = self.store.delete(&key).await {
                return degrade(self.config.failure_mode, "session", "clear", e, ());
            }
        }
        debug!(caller = %caller, "Session cleared");
        Ok(())
    }
}
