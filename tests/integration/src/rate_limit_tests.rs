//! Rate limiting integration tests

use crate::fixtures::*;
use crate::helpers::*;
use futures::future::join_all;
use gateway_core::GatewayError;
use gateway_resilience::{MemberStrategy, RateLimiterConfig, ResilienceConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn limits(max_requests: u32, window_secs: u64) -> ResilienceConfig {
    ResilienceConfig {
        rate_limiter: RateLimiterConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Ten requests pass, the eleventh is rejected with the configured limits
#[tokio::test]
async fn test_eleventh_request_rejected() {
    let harness = Harness::new();
    let limiter = harness.layer.rate_limiter();

    for n in 1..=10 {
        let decision = limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
        assert_eq!(decision.count, n);
    }

    let err = limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::RateLimit {
            max_requests: 10,
            window,
        } if window == Duration::from_secs(60)
    ));
    let message = err.to_string();
    assert!(message.contains("10"), "{message}");
    assert!(message.contains("60"), "{message}");
    assert_eq!(err.status_code().as_u16(), 429);
}

/// Requests exactly one window old still count; a moment later they do not
#[tokio::test]
async fn test_window_boundary() {
    let harness = Harness::with_config(limits(2, 60));
    let limiter = harness.layer.rate_limiter();

    limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
    harness.advance_secs(30);
    limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();

    harness.advance_secs(30);
    assert!(limiter.check_and_consume(CALLER, ENDPOINT).await.is_err());

    harness.advance(Duration::from_millis(1));
    let decision = limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
    assert_eq!(decision.count, 2);
}

/// Rejected requests do not extend the throttle
#[tokio::test]
async fn test_rejections_not_recorded() {
    let harness = Harness::with_config(limits(1, 10));
    let limiter = harness.layer.rate_limiter();

    limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
    for _ in 0..5 {
        harness.advance_secs(1);
        assert!(limiter.check_and_consume(CALLER, ENDPOINT).await.is_err());
    }
    assert_eq!(limiter.usage(CALLER, ENDPOINT).await.unwrap(), 1);

    harness.advance_secs(6);
    assert!(limiter.check_and_consume(CALLER, ENDPOINT).await.is_ok());
}

/// Windows are scoped to caller and endpoint
#[tokio::test]
async fn test_scoping() {
    let harness = Harness::with_config(limits(1, 60));
    let limiter = harness.layer.rate_limiter();

    limiter.check_and_consume("u1", "/chat").await.unwrap();
    assert!(limiter.check_and_consume("u1", "/chat").await.is_err());
    assert!(limiter.check_and_consume("u2", "/chat").await.is_ok());
    assert!(limiter.check_and_consume("u1", "/completions").await.is_ok());
}

/// Gateway instances share the window through the store
#[tokio::test]
async fn test_window_shared_between_instances() {
    let harness = Harness::with_config(limits(4, 60));
    let peer = harness.peer(limits(4, 60));

    for _ in 0..2 {
        harness.layer.rate_limiter().check_and_consume(CALLER, ENDPOINT).await.unwrap();
        peer.rate_limiter().check_and_consume(CALLER, ENDPOINT).await.unwrap();
    }
    assert!(peer
        .rate_limiter()
        .check_and_consume(CALLER, ENDPOINT)
        .await
        .is_err());
}

/// Concurrent admissions never exceed the limit
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admission_is_exact() {
    let harness = Harness::with_config(limits(10, 60));

    let attempts = (0..50).map(|_| {
        let limiter = harness.layer.rate_limiter().clone();
        tokio::spawn(async move { limiter.check_and_consume(CALLER, ENDPOINT).await })
    });
    let results = join_all(attempts).await;

    let admitted = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(Result::is_ok)
        .count();
    assert_eq!(admitted, 10);
    assert_eq!(
        harness.layer.rate_limiter().usage(CALLER, ENDPOINT).await.unwrap(),
        10
    );
}

/// Same-second requests collapse into one member in timestamp mode
#[tokio::test]
async fn test_timestamp_members_collapse() {
    let harness = Harness::with_config(ResilienceConfig {
        rate_limiter: RateLimiterConfig {
            max_requests: 2,
            member_strategy: MemberStrategy::Timestamp,
            ..Default::default()
        },
        ..Default::default()
    });
    let limiter = harness.layer.rate_limiter();

    for _ in 0..5 {
        limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
    }
    assert_eq!(limiter.usage(CALLER, ENDPOINT).await.unwrap(), 1);

    harness.advance_secs(1);
    limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
    assert_eq!(limiter.usage(CALLER, ENDPOINT).await.unwrap(), 2);
    assert!(limiter.check_and_consume(CALLER, ENDPOINT).await.is_err());
}

/// Stepwise mode enforces the same limit for sequential traffic
#[tokio::test]
async fn test_stepwise_mode() {
    let harness = Harness::with_config(ResilienceConfig {
        rate_limiter: RateLimiterConfig {
            max_requests: 3,
            atomic: false,
            ..Default::default()
        },
        ..Default::default()
    });
    let limiter = harness.layer.rate_limiter();

    for _ in 0..3 {
        limiter.check_and_consume(CALLER, ENDPOINT).await.unwrap();
    }
    assert!(limiter.check_and_consume(CALLER, ENDPOINT).await.is_err());
}

/// Window set expires when the caller goes quiet
#[tokio::test]
async fn test_window_key_expires() {
    let harness = Harness::with_config(limits(5, 60));
    harness
        .layer
        .rate_limiter()
        .check_and_consume(CALLER, ENDPOINT)
        .await
        .unwrap();
    assert_eq!(
        harness.store.ttl("rate_limit:u1:/chat"),
        Some(Duration::from_secs(60))
    );

    harness.advance_secs(60);
    assert!(harness.store.is_empty());
}

/// Per-call limits override configuration
#[tokio::test]
async fn test_explicit_limits() {
    let harness = Harness::new();
    let limiter = harness.layer.rate_limiter();

    limiter
        .check_and_consume_with(CALLER, "/embeddings", 1, Duration::from_secs(5))
        .await
        .unwrap();
    let err = limiter
        .check_and_consume_with(CALLER, "/embeddings", 1, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Rate limit exceeded. Max 1 requests per 5 seconds");
}
