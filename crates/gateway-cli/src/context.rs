//! Store session shared by commands that touch live state.
//!
//! Commands run every component fail-closed: an operator asking about state
//! must see an outage, not a permissive default.

use anyhow::{Context as _, Result};
use gateway_config::GatewayConfig;
use gateway_core::FailureMode;
use gateway_resilience::{RedisStore, ResilienceLayer, SystemClock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Connected store plus a layer built from the loaded configuration
pub struct StoreSession {
    store: Arc<RedisStore>,
    layer: ResilienceLayer,
    connect_time: Duration,
}

impl StoreSession {
    /// Connect using the `store` section of `config`
    pub async fn open(config: &GatewayConfig) -> Result<Self> {
        let started = Instant::now();
        let store = RedisStore::connect(
            &config.store.url,
            config.store.connect_timeout,
            config.store.operation_timeout,
        )
        .await
        .context("failed to connect to the state store")?;
        let connect_time = started.elapsed();

        let store = Arc::new(store);
        let layer = ResilienceLayer::new(
            store.clone(),
            Arc::new(SystemClock),
            config
                .to_resilience_config()
                .with_failure_mode(FailureMode::FailClosed),
        );
        Ok(Self {
            store,
            layer,
            connect_time,
        })
    }

    /// Components over the connected store
    pub const fn layer(&self) -> &ResilienceLayer {
        &self.layer
    }

    /// Sanitized store URL
    pub fn url(&self) -> &str {
        self.store.url()
    }

    /// Time spent connecting, including the initial PING
    pub const fn connect_time(&self) -> Duration {
        self.connect_time
    }

    /// Release the connection
    pub async fn close(self) {
        let Self { store, layer, .. } = self;
        drop(layer);
        match Arc::try_unwrap(store) {
            Ok(store) => store.close().await,
            Err(_) => debug!("Store still shared at shutdown, dropping reference"),
        }
    }
}
