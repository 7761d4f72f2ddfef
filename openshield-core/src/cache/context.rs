//! Conversational context cache
//!
//! One entry per session and most recent user turn. The session is the product
//! plus the model, so identical follow-ups inside a product reuse answers.
//! Writes are last-write-wins; two concurrent requests of one session can see
//! each other's answers.

use super::error::{CacheError, CacheResult};
use super::response::fingerprint;
use super::store::KvStore;
use crate::config::ContextCacheConfig;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Identity of one context cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextKey {
    pub product_id: String,
    pub model: String,
    pub prompt: String,
}

impl ContextKey {
    pub fn new(
        product_id: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            model: model.into(),
            prompt: prompt.into(),
        }
    }

    pub fn session_id(&self) -> String {
        format!("{}-{}", self.product_id, self.model)
    }
}

/// Value stored in the KV backend
#[derive(Debug, Serialize, Deserialize)]
struct ContextEntry {
    prompt: String,
    answer: String,
    product_id: String,
}

/// Body of the remote context service calls
#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    product_id: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<&'a str>,
}

enum Backend {
    Disabled,
    Kv {
        store: Arc<dyn KvStore>,
        prefix: String,
        ttl: Duration,
    },
    Remote {
        client: reqwest::Client,
        url: String,
    },
}

#[derive(Clone)]
pub struct ContextCache {
    backend: Arc<Backend>,
}

impl ContextCache {
    /// Build from config; `url` selects the remote service over the KV store
    pub fn new(
        config: &ContextCacheConfig,
        prefix: &str,
        store: Arc<dyn KvStore>,
        client: reqwest::Client,
    ) -> Self {
        let backend = match (config.enabled, &config.url) {
            (false, _) => Backend::Disabled,
            (true, Some(url)) => Backend::Remote {
                client,
                url: url.trim_end_matches('/').to_string(),
            },
            (true, None) => Backend::Kv {
                store,
                prefix: format!("{}:context", prefix),
                ttl: Duration::from_secs(config.ttl),
            },
        };
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: Arc::new(Backend::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(*self.backend, Backend::Disabled)
    }

    /// Cached answer for `key`; every failure is a miss
    pub async fn get(&self, key: &ContextKey) -> Option<String> {
        let result = match &*self.backend {
            Backend::Disabled => return None,
            Backend::Kv { store, prefix, .. } => kv_get(store.as_ref(), prefix, key).await,
            Backend::Remote { client, url } => remote_get(client, url, key).await,
        };

        match result {
            Ok(Some(answer)) => {
                debug!(session = %key.session_id(), "Context cache hit");
                Some(answer)
            }
            Ok(None) => {
                debug!(session = %key.session_id(), "Context cache miss");
                None
            }
            Err(e) => {
                warn!(session = %key.session_id(), error = %e, "Context cache read failed, treating as miss");
                None
            }
        }
    }

    /// Remember `answer` for `key`
    pub async fn set(&self, key: &ContextKey, answer: &str) {
        let result = match &*self.backend {
            Backend::Disabled => return,
            Backend::Kv { store, prefix, ttl } => {
                kv_set(store.as_ref(), prefix, *ttl, key, answer).await
            }
            Backend::Remote { client, url } => remote_set(client, url, key, answer).await,
        };

        if let Err(e) = result {
            warn!(session = %key.session_id(), error = %e, "Context cache write failed");
        }
    }
}

impl std::fmt::Debug for ContextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &*self.backend {
            Backend::Disabled => "disabled",
            Backend::Kv { .. } => "kv",
            Backend::Remote { .. } => "remote",
        };
        f.debug_struct("ContextCache").field("backend", &backend).finish()
    }
}

fn kv_key(prefix: &str, key: &ContextKey) -> String {
    format!(
        "{}:{}:{}",
        prefix,
        fingerprint(&key.session_id()),
        fingerprint(&key.prompt)
    )
}

async fn kv_get(store: &dyn KvStore, prefix: &str, key: &ContextKey) -> CacheResult<Option<String>> {
    let Some(raw) = store.get(&kv_key(prefix, key)).await? else {
        return Ok(None);
    };
    let entry: ContextEntry = serde_json::from_slice(&raw)?;
    // Guards against fingerprint collisions
    Ok((entry.prompt == key.prompt).then_some(entry.answer))
}

async fn kv_set(
    store: &dyn KvStore,
    prefix: &str,
    ttl: Duration,
    key: &ContextKey,
    answer: &str,
) -> CacheResult<()> {
    let entry = ContextEntry {
        prompt: key.prompt.clone(),
        answer: answer.to_string(),
        product_id: key.product_id.clone(),
    };
    let value = Bytes::from(serde_json::to_vec(&entry)?);
    store.set_ex(&kv_key(prefix, key), value, ttl).await
}

async fn remote_get(
    client: &reqwest::Client,
    url: &str,
    key: &ContextKey,
) -> CacheResult<Option<String>> {
    let session = key.session_id();
    let response = client
        .post(format!("{}/get", url))
        .json(&RemoteRequest {
            product_id: &session,
            prompt: &key.prompt,
            answer: None,
        })
        .send()
        .await?;

    match response.status() {
        StatusCode::OK => Ok(Some(response.text().await?)),
        StatusCode::NOT_FOUND => Ok(None),
        status => Err(CacheError::Remote {
            status: status.as_u16(),
        }),
    }
}

async fn remote_set(
    client: &reqwest::Client,
    url: &str,
    key: &ContextKey,
    answer: &str,
) -> CacheResult<()> {
    let session = key.session_id();
    let response = client
        .post(format!("{}/put", url))
        .json(&RemoteRequest {
            product_id: &session,
            prompt: &key.prompt,
            answer: Some(answer),
        })
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(CacheError::Remote {
            status: response.status().as_u16(),
        })
    }
}
