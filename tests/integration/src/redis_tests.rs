//! Live Redis tests
//!
//! Run with `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.
//! Every test uses fresh identifiers and deletes its keys afterwards.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::{echo_reply, MockUpstream};
use futures::future::join_all;
use gateway_core::{ChatTurn, GatewayError};
use gateway_resilience::{
    keys, CircuitState, KeyValueStore, RateLimiterConfig, ResilienceConfig, ResilienceLayer,
    ResilientGateway, SystemClock,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn live_layer(store: Arc<dyn KeyValueStore>, config: ResilienceConfig) -> ResilienceLayer {
    ResilienceLayer::new(store, Arc::new(SystemClock), config)
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_ping() {
    let Some(store) = live_store().await else {
        return;
    };
    assert!(store.ping().await.is_ok());
    assert!(store.is_distributed());
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_cache_round_trip() {
    let Some(store) = live_store().await else {
        return;
    };
    let layer = live_layer(store.clone(), ResilienceConfig::default());
    let caller = unique("cache");
    let prompt = unique("prompt");

    layer
        .cache()
        .store(
            &prompt,
            MODEL,
            &payload("hi"),
            Some(Duration::from_secs(30)),
            Some(&caller),
        )
        .await
        .unwrap();
    let found = layer.cache().lookup(&prompt, MODEL, Some(&caller)).await.unwrap();
    assert_eq!(found, Some(payload("hi")));

    let key = layer.cache().key(&prompt, MODEL, Some(&caller));
    assert!(layer.cache().invalidate(&prompt, MODEL, Some(&caller)).await.unwrap());
    assert_eq!(store.get(&key.store_key()).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_window_admits_exactly_max() {
    let Some(store) = live_store().await else {
        return;
    };
    let layer = live_layer(
        store.clone(),
        ResilienceConfig {
            rate_limiter: RateLimiterConfig {
                max_requests: 5,
                ..Default::default()
            },
            ..Default::default()
        },
    );
    let caller = unique("limit");

    let attempts = (0..20).map(|_| {
        let limiter = layer.rate_limiter().clone();
        let caller = caller.clone();
        tokio::spawn(async move { limiter.check_and_consume(&caller, ENDPOINT).await })
    });
    let admitted = join_all(attempts)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();

    assert_eq!(admitted, 5);
    assert_eq!(layer.rate_limiter().usage(&caller, ENDPOINT).await.unwrap(), 5);

    cleanup(store.as_ref(), &[keys::rate_limit(&caller, ENDPOINT)]).await;
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_circuit_lifecycle() {
    let Some(store) = live_store().await else {
        return;
    };
    let layer = live_layer(store.clone(), ResilienceConfig::default());
    let service = unique("svc");
    let breaker = layer.breaker(service.clone());

    for _ in 0..5 {
        breaker.record_failure().await.unwrap();
    }
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Open);
    assert!(matches!(
        breaker.check().await,
        Err(GatewayError::CircuitBreakerOpen { .. })
    ));

    breaker.reset().await.unwrap();
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
    assert_eq!(store.get(&keys::circuit_state(&service)).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_session() {
    let Some(store) = live_store().await else {
        return;
    };
    let layer = live_layer(store.clone(), ResilienceConfig::default());
    let caller = unique("session");

    layer
        .sessions()
        .save_context(&caller, &conversation(2), Some(Duration::from_secs(30)))
        .await
        .unwrap();
    layer.sessions().touch_activity(&caller).await.unwrap();

    assert_eq!(
        layer.sessions().get_context(&caller).await.unwrap(),
        conversation(2)
    );
    assert!(layer.sessions().is_active(&caller).await.unwrap());

    layer.sessions().clear(&caller).await.unwrap();
    assert!(layer.sessions().get_context(&caller).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_live_gateway_flow() {
    let Some(store) = live_store().await else {
        return;
    };
    let layer = live_layer(store.clone(), ResilienceConfig::default());
    let caller = unique("e2e");
    let service = unique("svc");
    let upstream = MockUpstream::new();
    let gateway =
        ResilientGateway::new(layer.clone(), upstream.clone()).with_service(service.clone());

    let first = gateway.handle(&chat(&caller, "live prompt")).await.unwrap();
    let second = gateway.handle(&chat(&caller, "live prompt")).await.unwrap();
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(upstream.calls(), 1);

    let history = layer.sessions().get_context(&caller).await.unwrap();
    assert_eq!(history.last(), Some(&ChatTurn::assistant(echo_reply("live prompt"))));

    let cache_key = layer.cache().key("live prompt", MODEL, Some(&caller));
    cleanup(
        store.as_ref(),
        &[
            cache_key.store_key(),
            keys::rate_limit(&caller, ENDPOINT),
            keys::session(&caller),
            keys::activity(&caller),
            keys::circuit_state(&service),
            keys::circuit_failures(&service),
            keys::circuit_last_failure(&service),
        ],
    )
    .await;
}
