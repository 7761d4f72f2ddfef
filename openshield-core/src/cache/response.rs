//! Flat response cache
//!
//! Exact request/response pairs, stored as the bytes that were sent to the
//! client so a hit replays them unchanged. Keys are hashed with xxh64 before
//! they reach the backend.

use super::store::KvStore;
use crate::config::CacheConfig;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

/// Fingerprint of a cache key; collisions are accepted given the short TTL
pub fn fingerprint(key: &str) -> String {
    xxh64(key.as_bytes(), 0).to_string()
}

#[derive(Clone)]
pub struct ResponseCache {
    store: Option<Arc<dyn KvStore>>,
    prefix: String,
    ttl: Duration,
}

impl ResponseCache {
    /// Cache over `store`; a disabled config yields a pass-through cache
    pub fn new(config: &CacheConfig, store: Arc<dyn KvStore>) -> Self {
        Self {
            store: config.enabled.then_some(store),
            prefix: config.prefix.clone(),
            ttl: Duration::from_secs(config.ttl),
        }
    }

    /// Cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            store: None,
            prefix: String::new(),
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Backend key for `key`
    pub fn backend_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, fingerprint(key))
    }

    /// Look up `key`; backend failures count as a miss
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let store = self.store.as_ref()?;
        let backend_key = self.backend_key(key);
        match store.get(&backend_key).await {
            Ok(Some(value)) => {
                debug!(key = %backend_key, "Response cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key = %backend_key, "Response cache miss");
                None
            }
            Err(e) => {
                warn!(key = %backend_key, error = %e, "Response cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store `value` under `key` with the configured TTL
    pub async fn set(&self, key: &str, value: Bytes) {
        self.set_with_ttl(key, value, self.ttl).await
    }

    pub async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let backend_key = self.backend_key(key);
        if let Err(e) = store.set_ex(&backend_key, value, ttl).await {
            warn!(key = %backend_key, error = %e, "Response cache write failed");
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.is_enabled())
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}
