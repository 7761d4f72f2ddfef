//! Cache tiers against a remote context service and the in-process store

use bytes::Bytes;
use openshield_core::cache::{ContextCache, ContextKey, KvStore, MemoryStore, ResponseCache};
use openshield_core::config::{CacheConfig, ContextCacheConfig};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_cache(server: &MockServer) -> ContextCache {
    let config = ContextCacheConfig {
        enabled: true,
        ttl: 3600,
        url: Some(format!("{}/", server.uri())),
    };
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    ContextCache::new(&config, "openshield", store, reqwest::Client::new())
}

#[tokio::test]
async fn test_remote_context_hit_and_miss() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/get"))
        .and(body_json(json!({"product_id": "p1-gpt-4", "prompt": "Hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("Hi from cache"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/get"))
        .and(body_json(json!({"product_id": "p1-gpt-4", "prompt": "Bye"})))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cache = remote_cache(&server);
    assert_eq!(
        cache.get(&ContextKey::new("p1", "gpt-4", "Hello")).await.as_deref(),
        Some("Hi from cache")
    );
    assert_eq!(cache.get(&ContextKey::new("p1", "gpt-4", "Bye")).await, None);
}

#[tokio::test]
async fn test_remote_context_put() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/put"))
        .and(body_json(json!({"product_id": "p1-gpt-4", "prompt": "Hello", "answer": "Hi"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    remote_cache(&server)
        .set(&ContextKey::new("p1", "gpt-4", "Hello"), "Hi")
        .await;
}

#[tokio::test]
async fn test_remote_failures_are_misses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cache = remote_cache(&server);
    let key = ContextKey::new("p1", "gpt-4", "Hello");
    assert_eq!(cache.get(&key).await, None);
    // A failed write is logged, never surfaced
    cache.set(&key, "Hi").await;
}

#[tokio::test(start_paused = true)]
async fn test_response_cache_expires_after_ttl() {
    let store = Arc::new(MemoryStore::new());
    let config = CacheConfig {
        enabled: true,
        ttl: 30,
        prefix: "openshield".into(),
    };
    let cache = ResponseCache::new(&config, store.clone());
    let value = Bytes::from_static(br#"{"id":"chatcmpl-1"}"#);

    cache.set("request-a", value.clone()).await;
    assert_eq!(cache.get("request-a").await, Some(value));
    assert_eq!(cache.get("request-b").await, None);

    tokio::time::advance(std::time::Duration::from_secs(31)).await;
    assert_eq!(cache.get("request-a").await, None);
}

#[tokio::test]
async fn test_disabled_response_cache_is_pass_through() {
    let store = Arc::new(MemoryStore::new());
    let config = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let cache = ResponseCache::new(&config, store.clone());

    cache.set("k", Bytes::from_static(b"v")).await;
    assert_eq!(cache.get("k").await, None);
    assert!(store.is_empty());
}
