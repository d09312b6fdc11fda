//! End-to-end integration tests
//!
//! Complete request flows through the gateway: limiter, activity, cache,
//! circuit, upstream and the bookkeeping that follows.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::{echo_reply, MockUpstream};
use futures::future::join_all;
use gateway_core::{ChatRequest, ChatTurn, GatewayError};
use gateway_resilience::CircuitState;
use pretty_assertions::assert_eq;
use std::time::Duration;

/// E2E test: first request misses, repeat is served from cache
#[tokio::test]
async fn test_e2e_miss_then_hit() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    let first = gateway.handle(&chat(CALLER, "What is Rust?")).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.response, echo_reply("What is Rust?"));
    assert_eq!(first.model, MODEL);
    assert_eq!(first.caller_id, CALLER);

    let second = gateway.handle(&chat(CALLER, "What is Rust?")).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.response, first.response);
    assert_eq!(second.model, MODEL);
    assert_ne!(second.id, first.id);

    assert_eq!(upstream.calls(), 1);
}

/// E2E test: the upstream sees the conversation so far
#[tokio::test]
async fn test_e2e_context_passed_upstream() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    gateway.handle(&chat(CALLER, "one")).await.unwrap();
    gateway.handle(&chat(CALLER, "two")).await.unwrap();

    let contexts = upstream.contexts();
    assert!(contexts[0].is_empty());
    assert_eq!(
        contexts[1],
        vec![ChatTurn::user("one"), ChatTurn::assistant(echo_reply("one"))]
    );
}

/// E2E test: a cached answer is keyed on model as well as prompt
#[tokio::test]
async fn test_e2e_model_is_part_of_key() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    gateway.handle(&chat(CALLER, "same")).await.unwrap();
    let other = ChatRequest::new(CALLER, "same").with_model("gpt-4o");
    let response = gateway.handle(&other).await.unwrap();

    assert!(!response.cached);
    assert_eq!(response.model, "gpt-4o");
    assert_eq!(upstream.calls(), 2);
}

/// E2E test: repeated upstream failures open the circuit
#[tokio::test]
async fn test_e2e_failures_open_circuit() {
    let harness = Harness::new();
    let upstream = MockUpstream::failing();
    let gateway = harness.gateway(upstream.clone());

    for _ in 0..5 {
        let err = gateway.handle(&chat(CALLER, "hello")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { .. }));
    }
    assert_eq!(gateway.breaker().state().await.unwrap(), CircuitState::Open);

    let err = gateway.handle(&chat(CALLER, "hello")).await.unwrap_err();
    assert!(matches!(err, GatewayError::CircuitBreakerOpen { ref service } if service == "llm"));
    assert_eq!(upstream.calls(), 5);

    // Failed exchanges leave no history or cache entry
    assert!(harness
        .layer
        .sessions()
        .get_context(CALLER)
        .await
        .unwrap()
        .is_empty());
}

/// E2E test: a successful probe after the recovery timeout closes the circuit
#[tokio::test]
async fn test_e2e_half_open_probe_recovers() {
    let harness = Harness::new();
    let upstream = MockUpstream::failing();
    let gateway = harness.gateway(upstream.clone());

    for _ in 0..5 {
        let _ = gateway.handle(&chat(CALLER, "hello")).await;
    }
    harness.advance_secs(61);
    upstream.heal();

    let response = gateway.handle(&chat(CALLER, "hello")).await.unwrap();
    assert_eq!(response.response, echo_reply("hello"));

    let stats = gateway.breaker().stats().await.unwrap();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failures, 0);
}

/// E2E test: a failed probe re-opens the circuit
#[tokio::test]
async fn test_e2e_half_open_probe_fails() {
    let harness = Harness::new();
    let upstream = MockUpstream::failing();
    let gateway = harness.gateway(upstream.clone());

    for _ in 0..5 {
        let _ = gateway.handle(&chat(CALLER, "hello")).await;
    }
    harness.advance_secs(61);

    let err = gateway.handle(&chat(CALLER, "hello")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Upstream { .. }));
    assert_eq!(gateway.breaker().state().await.unwrap(), CircuitState::Open);
    assert_eq!(upstream.calls(), 6);
}

/// E2E test: cached answers are still served while the circuit is open
#[tokio::test]
async fn test_e2e_cache_served_while_open() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    gateway.handle(&chat(CALLER, "cached")).await.unwrap();
    gateway.breaker().force_open().await.unwrap();

    let hit = gateway.handle(&chat(CALLER, "cached")).await.unwrap();
    assert!(hit.cached);

    let miss = gateway.handle(&chat(CALLER, "uncached")).await.unwrap_err();
    assert!(matches!(miss, GatewayError::CircuitBreakerOpen { .. }));
    assert_eq!(upstream.calls(), 1);
}

/// E2E test: the limiter rejects before the upstream is reached
#[tokio::test]
async fn test_e2e_rate_limit_before_upstream() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    for i in 0..10 {
        gateway
            .handle(&chat(CALLER, &format!("prompt {i}")))
            .await
            .unwrap();
    }

    let err = gateway.handle(&chat(CALLER, "one more")).await.unwrap_err();
    assert!(matches!(err, GatewayError::RateLimit { max_requests: 10, .. }));
    assert_eq!(upstream.calls(), 10);

    // Other callers are unaffected
    assert!(gateway.handle(&chat("u2", "one more")).await.is_ok());
}

/// E2E test: cache hits count against the caller's window
#[tokio::test]
async fn test_e2e_cache_hits_are_rate_limited() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    for _ in 0..10 {
        gateway.handle(&chat(CALLER, "same")).await.unwrap();
    }
    assert!(gateway.handle(&chat(CALLER, "same")).await.is_err());
    assert_eq!(upstream.calls(), 1);

    harness.advance_secs(61);
    assert!(gateway.handle(&chat(CALLER, "same")).await.unwrap().cached);
}

/// E2E test: malformed requests touch no state
#[tokio::test]
async fn test_e2e_validation() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    for request in [
        ChatRequest::new(CALLER, ""),
        ChatRequest::new("  ", "hello"),
        ChatRequest::new("u1:/admin", "hello"),
        ChatRequest::new(CALLER, "hello").with_model(""),
    ] {
        let err = gateway.handle(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
        assert_eq!(err.status_code().as_u16(), 400);
    }

    assert!(harness.store.is_empty());
    assert_eq!(upstream.calls(), 0);
}

/// E2E test: custom endpoint label and service name select their own keys
#[tokio::test]
async fn test_e2e_custom_endpoint_and_service() {
    let harness = Harness::new();
    let gateway = harness
        .gateway(MockUpstream::failing())
        .with_endpoint("/v1/chat")
        .with_service("completions");

    let _ = gateway.handle(&chat(CALLER, "hello")).await;

    assert!(harness.store.ttl("rate_limit:u1:/v1/chat").is_some());
    assert!(harness.store.ttl("rate_limit:u1:/chat").is_none());
    assert_eq!(gateway.breaker().service(), "completions");
    assert_eq!(gateway.breaker().stats().await.unwrap().failures, 1);
    assert_eq!(
        harness.layer.breaker("llm").stats().await.unwrap().failures,
        0
    );
}

/// E2E test: a cached payload without text is regenerated and overwritten
#[tokio::test]
async fn test_e2e_incomplete_cached_payload() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    let gateway = harness.gateway(upstream.clone());

    let mut incomplete = payload("ignored");
    incomplete.remove("content");
    harness
        .layer
        .cache()
        .store("hello", MODEL, &incomplete, None, Some(CALLER))
        .await
        .unwrap();

    let response = gateway.handle(&chat(CALLER, "hello")).await.unwrap();
    assert!(!response.cached);
    assert_eq!(upstream.calls(), 1);

    let repaired = gateway.handle(&chat(CALLER, "hello")).await.unwrap();
    assert!(repaired.cached);
    assert_eq!(repaired.response, echo_reply("hello"));
}

/// E2E test: scripted upstream errors are returned unchanged
#[tokio::test]
async fn test_e2e_upstream_error_passthrough() {
    let harness = Harness::new();
    let upstream = MockUpstream::new();
    upstream.push(Err(GatewayError::upstream("mock", "quota exhausted")));
    let gateway = harness.gateway(upstream.clone());

    let err = gateway.handle(&chat(CALLER, "hello")).await.unwrap_err();
    assert!(err.to_string().contains("quota exhausted"), "{err}");
    assert_eq!(gateway.breaker().stats().await.unwrap().failures, 1);

    let ok = gateway.handle(&chat(CALLER, "hello")).await.unwrap();
    assert_eq!(ok.response, echo_reply("hello"));
}

/// E2E test: concurrent requests from one caller share one window
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_e2e_concurrent_requests() {
    let harness = Harness::new();
    let upstream = MockUpstream::slow(Duration::from_millis(10));
    let gateway = harness.gateway(upstream.clone());

    let requests = (0..12).map(|i| {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.handle(&chat(CALLER, &format!("prompt {i}"))).await })
    });
    let results: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(GatewayError::RateLimit { .. })))
        .count();
    assert_eq!(admitted, 10);
    assert_eq!(limited, 2);
    assert_eq!(upstream.calls(), 10);
}
