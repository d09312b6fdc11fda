//! Response cache integration tests

use crate::fixtures::*;
use crate::helpers::*;
use gateway_resilience::{keys, CacheKey, ResilienceConfig, ResponseCacheConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;

/// Same inputs always map to the same store key
#[tokio::test]
async fn test_key_determinism_across_instances() {
    let harness = Harness::new();
    let peer = harness.peer(ResilienceConfig::default());

    let a = harness.layer.cache().key("hello", MODEL, Some(CALLER));
    let b = peer.cache().key("hello", MODEL, Some(CALLER));
    assert_eq!(a, b);
    assert_eq!(a, CacheKey::derive("hello", MODEL, Some(CALLER)));
    assert!(a.store_key().starts_with("llm_cache:"));
    assert_eq!(a.as_str().len(), 64);
}

/// Any differing field yields a different key
#[tokio::test]
async fn test_key_sensitivity() {
    let base = CacheKey::derive("hello", MODEL, Some(CALLER));
    assert_ne!(base, CacheKey::derive("hello!", MODEL, Some(CALLER)));
    assert_ne!(base, CacheKey::derive("hello", "other-model", Some(CALLER)));
    assert_ne!(base, CacheKey::derive("hello", MODEL, Some("u2")));
    assert_ne!(base, CacheKey::derive("hello", MODEL, None));
}

/// Field boundaries are part of the key
#[tokio::test]
async fn test_key_field_boundaries() {
    assert_ne!(
        CacheKey::derive("ab", "c", None),
        CacheKey::derive("a", "bc", None)
    );
}

/// Stored results are visible to another instance over the same store
#[tokio::test]
async fn test_round_trip_between_instances() {
    let harness = Harness::new();
    let peer = harness.peer(ResilienceConfig::default());

    harness
        .layer
        .cache()
        .store("hello", MODEL, &payload("hi there"), None, Some(CALLER))
        .await
        .unwrap();

    let found = peer
        .cache()
        .lookup("hello", MODEL, Some(CALLER))
        .await
        .unwrap();
    assert_eq!(found, Some(payload("hi there")));
}

/// Entries disappear once their TTL passes
#[tokio::test]
async fn test_ttl_expiry() {
    let harness = Harness::new();
    let cache = harness.layer.cache();

    cache
        .store("hello", MODEL, &payload("x"), Some(Duration::from_secs(5)), None)
        .await
        .unwrap();

    harness.advance_secs(4);
    assert!(cache.lookup("hello", MODEL, None).await.unwrap().is_some());

    harness.advance_secs(1);
    assert!(cache.lookup("hello", MODEL, None).await.unwrap().is_none());
}

/// Default TTL comes from configuration
#[tokio::test]
async fn test_default_ttl_applied() {
    let harness = Harness::new();
    harness
        .layer
        .cache()
        .store("hello", MODEL, &payload("x"), None, Some(CALLER))
        .await
        .unwrap();

    let key = CacheKey::derive("hello", MODEL, Some(CALLER));
    assert_eq!(
        harness.store.ttl(&key.store_key()),
        Some(Duration::from_secs(3600))
    );
}

/// Later writes replace earlier ones
#[tokio::test]
async fn test_last_write_wins() {
    let harness = Harness::new();
    let cache = harness.layer.cache();

    cache.store("q", MODEL, &payload("first"), None, None).await.unwrap();
    cache.store("q", MODEL, &payload("second"), None, None).await.unwrap();

    assert_eq!(
        cache.lookup("q", MODEL, None).await.unwrap(),
        Some(payload("second"))
    );
}

/// Callers do not see each other's entries unless the cache is shared
#[tokio::test]
async fn test_per_caller_isolation() {
    let harness = Harness::new();
    let cache = harness.layer.cache();
    cache
        .store("q", MODEL, &payload("private"), None, Some("u1"))
        .await
        .unwrap();
    assert!(cache.lookup("q", MODEL, Some("u2")).await.unwrap().is_none());

    let shared = Harness::with_config(ResilienceConfig {
        cache: ResponseCacheConfig {
            per_caller: false,
            ..Default::default()
        },
        ..Default::default()
    });
    shared
        .layer
        .cache()
        .store("q", MODEL, &payload("shared"), None, Some("u1"))
        .await
        .unwrap();
    assert_eq!(
        shared.layer.cache().lookup("q", MODEL, Some("u2")).await.unwrap(),
        Some(payload("shared"))
    );
}

/// A corrupt entry reads as a miss
#[tokio::test]
async fn test_corrupt_entry_is_a_miss() {
    let harness = Harness::new();
    let key = CacheKey::derive("q", MODEL, None);
    harness
        .layer
        .store()
        .set(&keys::cache(key.as_str()), "not json", None)
        .await
        .unwrap();

    assert!(harness
        .layer
        .cache()
        .lookup("q", MODEL, None)
        .await
        .unwrap()
        .is_none());
}

/// Disabled cache never touches the store
#[tokio::test]
async fn test_disabled_cache() {
    let harness = Harness::with_config(ResilienceConfig {
        cache: ResponseCacheConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    });
    let cache = harness.layer.cache();

    cache.store("q", MODEL, &payload("x"), None, None).await.unwrap();
    assert!(harness.store.is_empty());
    assert!(cache.lookup("q", MODEL, None).await.unwrap().is_none());
}

/// Invalidation removes only the targeted entry
#[tokio::test]
async fn test_invalidate() {
    let harness = Harness::new();
    let cache = harness.layer.cache();
    cache.store("a", MODEL, &payload("a"), None, None).await.unwrap();
    cache.store("b", MODEL, &payload("b"), None, None).await.unwrap();

    assert!(cache.invalidate("a", MODEL, None).await.unwrap());
    assert!(!cache.invalidate("a", MODEL, None).await.unwrap());
    assert!(cache.lookup("b", MODEL, None).await.unwrap().is_some());
}
