//! End-to-end request lifecycle
//!
//! decode, validate, audit input, run the rule pipeline, consult the caches,
//! call the provider, store, audit output, record usage.
//!
//! Blocked requests stop after the rule pipeline with an output audit of the
//! block message and no usage. Cache hits skip the provider and usage. Streams
//! hand a [`StreamSession`] back to the caller, which writes the output audit
//! when it ends.

mod context;
mod error;
mod snapshot;
mod stream;
mod trail;

pub use context::RequestContext;
pub use error::{ErrorBody, ErrorClass, ErrorDetail, GatewayError};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use stream::StreamSession;

use crate::audit::AuditSink;
use crate::cache::ContextKey;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, Usage};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use stream::error_message;
use tracing::{debug, error, info, warn};
use trail::{Recorder, UsageEntry};

/// Value of the `OS-Cache-Status` response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body ready for the client
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub body: Bytes,
    pub cache_status: CacheStatus,
}

/// Outcome of a chat completion request
#[derive(Debug)]
pub enum ChatReply {
    Complete(Reply),
    Stream(StreamSession),
}

/// Composes rules, caches, providers and the audit trail
#[derive(Clone)]
pub struct Orchestrator {
    snapshots: SnapshotHandle,
    sink: Arc<dyn AuditSink>,
}

impl Orchestrator {
    pub fn new(snapshots: SnapshotHandle, sink: Arc<dyn AuditSink>) -> Self {
        Self { snapshots, sink }
    }

    pub fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshots
    }

    /// Handle `POST /{provider}/v1/chat/completions`
    pub async fn chat_completion(
        &self,
        ctx: &RequestContext,
        body: &[u8],
    ) -> Result<ChatReply, GatewayError> {
        let snapshot = self.snapshots.current();

        let request: ChatCompletionRequest = serde_json::from_slice(body).map_err(|e| {
            GatewayError::InvalidRequest {
                message: format!("invalid request body: {}", e),
                param: None,
                code: "invalid_json",
            }
        })?;
        request.validate()?;

        let provider = snapshot
            .providers
            .get(&ctx.provider)
            .ok_or_else(|| GatewayError::ProviderNotFound(ctx.provider.clone()))?;

        debug!(
            request_id = %ctx.request_id,
            provider = %ctx.provider,
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Chat completion request"
        );

        let recorder = Recorder::new(
            Arc::clone(&self.sink),
            ctx.clone(),
            snapshot.audit_logging,
            snapshot.usage_logging,
        );
        recorder.input(to_json(&request)).await;

        let decision = match snapshot.pipeline.evaluate(&snapshot.rules, &request).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(request_id = %ctx.request_id, error = %e, "Rule pipeline failed");
                recorder
                    .output("error".to_string(), error_message(&e.to_string()), None)
                    .await;
                return Err(e.into());
            }
        };
        if decision.is_blocked() {
            info!(
                request_id = %ctx.request_id,
                rule = decision.blocked_by.as_deref().unwrap_or("-"),
                "Request blocked by input rules"
            );
            recorder
                .output("rule_filtered".to_string(), decision.message.clone(), None)
                .await;
            return Err(GatewayError::RuleBlocked(decision.message));
        }
        let request = request.with_messages(decision.messages);

        if request.stream {
            return match provider.create_chat_completion_stream(&request).await {
                Ok(stream) => Ok(ChatReply::Stream(StreamSession::new(
                    stream,
                    recorder,
                    ctx.request_id.clone(),
                    request.model.clone(),
                ))),
                Err(e) => {
                    warn!(request_id = %ctx.request_id, error = %e, "Failed to open upstream stream");
                    recorder
                        .output("error".to_string(), error_message(&e.to_string()), None)
                        .await;
                    Err(e.into())
                }
            };
        }

        // Context tier first, then the flat response cache
        let context_key = ContextKey::new(
            ctx.product_id.to_string(),
            &request.model,
            request.last_user_message(),
        );
        if let Some(answer) = snapshot.context_cache.get(&context_key).await {
            debug!(request_id = %ctx.request_id, "Context cache hit");
            let response = ChatCompletionResponse::assistant(
                format!("cached_{}", ctx.product_id),
                chrono::Utc::now().timestamp(),
                &request.model,
                answer,
                "stop",
                Usage::default(),
            );
            let body = Bytes::from(to_json(&response));
            recorder
                .output(recorder.completion_type(), lossy(&body), None)
                .await;
            return Ok(ChatReply::Complete(Reply {
                body,
                cache_status: CacheStatus::Hit,
            }));
        }

        let cache_key = request.cache_key();
        if let Some(body) = snapshot.response_cache.get(&cache_key).await {
            debug!(request_id = %ctx.request_id, "Response cache hit");
            recorder
                .output(recorder.completion_type(), lossy(&body), None)
                .await;
            return Ok(ChatReply::Complete(Reply {
                body,
                cache_status: CacheStatus::Hit,
            }));
        }

        let cache_status = if snapshot.context_cache.is_enabled() || snapshot.response_cache.is_enabled() {
            CacheStatus::Miss
        } else {
            CacheStatus::Bypass
        };

        let response = match provider.create_chat_completion(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    request_id = %ctx.request_id,
                    provider = %ctx.provider,
                    status = ?e.upstream_status(),
                    error = %e,
                    "Upstream call failed"
                );
                recorder
                    .output("error".to_string(), error_message(&e.to_string()), None)
                    .await;
                return Err(e.into());
            }
        };

        let body = Bytes::from(to_json(&response));
        let usage = UsageEntry {
            model: response.model.clone(),
            usage: response.usage,
            finish_reason: response.finish_reason().to_string(),
        };
        // Audit before the cache writes so a slow or stalled KV cannot lose it
        recorder
            .output(recorder.completion_type(), lossy(&body), Some(usage))
            .await;

        snapshot.response_cache.set(&cache_key, body.clone()).await;
        if let Some(content) = response.content() {
            snapshot.context_cache.set(&context_key, content).await;
        }

        Ok(ChatReply::Complete(Reply { body, cache_status }))
    }

    /// Handle `GET /{provider}/v1/models`
    pub async fn list_models(&self, ctx: &RequestContext) -> Result<Reply, GatewayError> {
        let key = format!("/{}/v1/models", ctx.provider);
        self.cached_read(ctx, key, |provider| async move { provider.list_models().await })
            .await
    }

    /// Handle `GET /{provider}/v1/models/{model}`
    pub async fn get_model(&self, ctx: &RequestContext, model: &str) -> Result<Reply, GatewayError> {
        let key = format!("/{}/v1/models/{}", ctx.provider, model);
        let model = model.to_string();
        self.cached_read(ctx, key, |provider| async move { provider.get_model(&model).await })
            .await
    }

    /// Idempotent read through the response cache, keyed by URL path
    async fn cached_read<F, Fut>(
        &self,
        ctx: &RequestContext,
        key: String,
        fetch: F,
    ) -> Result<Reply, GatewayError>
    where
        F: FnOnce(Arc<dyn crate::providers::Provider>) -> Fut,
        Fut: std::future::Future<Output = crate::providers::ProviderResult<Bytes>>,
    {
        let snapshot = self.snapshots.current();
        let provider = snapshot
            .providers
            .get(&ctx.provider)
            .ok_or_else(|| GatewayError::ProviderNotFound(ctx.provider.clone()))?;

        if let Some(body) = snapshot.response_cache.get(&key).await {
            return Ok(Reply {
                body,
                cache_status: CacheStatus::Hit,
            });
        }

        let body = fetch(provider).await.map_err(|e| {
            warn!(request_id = %ctx.request_id, path = %key, error = %e, "Model read failed");
            GatewayError::from(e)
        })?;

        let cache_status = if snapshot.response_cache.is_enabled() {
            snapshot.response_cache.set(&key, body.clone()).await;
            CacheStatus::Miss
        } else {
            CacheStatus::Bypass
        };
        Ok(Reply { body, cache_status })
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn lossy(body: &Bytes) -> String {
    String::from_utf8_lossy(body).into_owned()
}
