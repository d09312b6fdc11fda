//! Response cache over the shared store.
//!
//! Entries live at `llm_cache:<hash>` where the hash covers prompt, model and
//! (optionally) caller. Expiry is the only eviction path; concurrent writers
//! for the same key race and the last write wins.

use crate::keys;
use crate::store::{degrade, KeyValueStore};
use gateway_core::{FailureMode, GatewayResult, ResultPayload};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PREVIEW_CHARS: usize = 50;

/// Response cache configuration
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    /// Whether lookups and writes touch the store at all
    pub enabled: bool,
    /// TTL applied when `store` is called without one
    pub default_ttl: Duration,
    /// Whether the caller id participates in the key
    pub per_caller: bool,
    /// Behaviour on store failure
    pub failure_mode: FailureMode,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(3600),
            per_caller: true,
            failure_mode: FailureMode::FailOpen,
        }
    }
}

/// Deterministic cache key: hex SHA-256 over length-prefixed fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from (prompt, model, caller).
    ///
    /// A missing caller hashes the same as an empty one.
    #[must_use]
    pub fn derive(prompt: &str, model: &str, caller: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        for field in [prompt, model, caller.unwrap_or_default()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full store key
    #[must_use]
    pub fn store_key(&self) -> String {
        keys::cache(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache of upstream results keyed by request content
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    config: ResponseCacheConfig,
}

impl ResponseCache {
    /// Create a cache over `store`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: ResponseCacheConfig) -> Self {
        Self { store, config }
    }

    /// Create a cache with default configuration
    #[must_use]
    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, ResponseCacheConfig::default())
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &ResponseCacheConfig {
        &self.config
    }

    /// Key for a request, honouring `per_caller`
    #[must_use]
    pub fn key(&self, prompt: &str, model: &str, caller: Option<&str>) -> CacheKey {
        let caller = if self.config.per_caller { caller } else { None };
        CacheKey::derive(prompt, model, caller)
    }

    /// Fetch a cached result.
    ///
    /// Returns `Ok(None)` on a miss, an expired entry, or an undecodable
    /// payload. Store failures follow the configured failure mode.
    pub async fn lookup(
        &self,
        prompt: &str,
        model: &str,
        caller: Option<&str>,
    ) -> GatewayResult<Option<ResultPayload>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let key = self.key(prompt, model, caller);
        let raw = match self.store.get(&key.store_key()).await {
            Ok(raw) => raw,
            Err(e) => return degrade(self.config.failure_mode, "cache", "lookup", e, None),
        };

        let Some(raw) = raw else {
            debug!(key = %key, prompt = %preview(prompt), "Cache miss");
            return Ok(None);
        };

        match serde_json::from_str::<ResultPayload>(&raw) {
            Ok(payload) => {
                info!(key = %key, prompt = %preview(prompt), "Cache hit");
                Ok(Some(payload))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Store a result under the request's key
    pub async fn store(
        &self,
        prompt: &str,
        model: &str,
        result: &ResultPayload,
        ttl: Option<Duration>,
        caller: Option<&str>,
    ) -> GatewayResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let key = self.key(prompt, model, caller);
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let value = serde_json::to_string(result)?;

        match self.store.set(&key.store_key(), &value, Some(ttl)).await {
            Ok(()) => {
                debug!(
                    key = %key,
                    prompt = %preview(prompt),
                    ttl_secs = ttl.as_secs(),
                    "Cached response"
                );
                Ok(())
            }
            Err(e) => degrade(self.config.failure_mode, "cache", "store", e, ()),
        }
    }

    /// Fetch the raw stored value for a known key
    pub async fn get_raw(&self, key: &CacheKey) -> GatewayResult<Option<String>> {
        match self.store.get(&key.store_key()).await {
            Ok(raw) => Ok(raw),
            Err(e) => degrade(self.config.failure_mode, "cache", "get_raw", e, None),
        }
    }

    /// Remove the entry for a request, returning whether it existed
    pub async fn invalidate(
        &self,
        prompt: &str,
        model: &str,
        caller: Option<&str>,
    ) -> GatewayResult<bool> {
        let key = self.key(prompt, model, caller);
        match self.store.delete(&key.store_key()).await {
            Ok(existed) => Ok(existed),
            Err(e) => degrade(self.config.failure_mode, "cache", "invalidate", e, false),
        }
    }
}

fn preview(prompt: &str) -> String {
    prompt.chars().take(PREVIEW_CHARS).collect()
}
