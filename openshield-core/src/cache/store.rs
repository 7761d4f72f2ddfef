//! Key-value backends for both cache tiers

use super::error::{CacheError, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Minimal KV contract: atomic per-key writes, expiry owned by the backend
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()>;
}

/// Redis-backed store
///
/// The connection manager reconnects on its own; a call made while redis is
/// down simply fails and the caller treats it as a miss.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(uri: &str) -> CacheResult<Self> {
        let client = redis::Client::open(uri)?;
        let connection = client.get_connection_manager().await?;
        info!("Connected to redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        let mut connection = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = connection.set_ex(key, value.as_ref(), seconds).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

/// Entries beyond this count trigger a sweep of expired keys on write
const SWEEP_THRESHOLD: usize = 1024;

/// In-process TTL map for single-node runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Bytes, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Bytes, Instant)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            return Err(CacheError::Backend("ttl must be positive".to_string()));
        }
        let now = Instant::now();
        let mut entries = self.lock();
        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, (_, expires)| *expires > now);
        }
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }
}
