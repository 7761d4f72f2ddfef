//! Client-facing side of a streamed completion
//!
//! A [`StreamSession`] forwards chunks one at a time and writes the output audit
//! exactly once: when the upstream ends, when it fails, or when the session is
//! dropped early because the client went away.

use super::error::GatewayError;
use super::trail::{Recorder, UsageEntry};
use crate::protocol::{ChatCompletionResponse, StreamChunk, Usage};
use crate::providers::ChatStream;
use tracing::{debug, warn};

pub struct StreamSession {
    stream: ChatStream,
    recorder: Recorder,
    request_id: String,
    id: String,
    created: i64,
    model: String,
    content: String,
    finish_reason: Option<String>,
    usage: Usage,
    finished: bool,
}

impl StreamSession {
    pub(crate) fn new(stream: ChatStream, recorder: Recorder, request_id: String, model: String) -> Self {
        Self {
            stream,
            recorder,
            request_id,
            id: String::new(),
            created: chrono::Utc::now().timestamp(),
            model,
            content: String::new(),
            finish_reason: None,
            usage: Usage::default(),
            finished: false,
        }
    }

    /// Next chunk for the client; `Ok(None)` once the stream is over
    pub async fn next_chunk(&mut self) -> Result<Option<StreamChunk>, GatewayError> {
        if self.finished {
            return Ok(None);
        }

        match self.stream.recv().await {
            Ok(Some(chunk)) => {
                self.observe(&chunk);
                Ok(Some(chunk))
            }
            Ok(None) => {
                self.finished = true;
                debug!(request_id = %self.request_id, chars = self.content.len(), "Stream completed");
                let (message, usage) = self.summary();
                self.recorder
                    .output(self.recorder.completion_type(), message, Some(usage))
                    .await;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                self.stream.close();
                warn!(request_id = %self.request_id, error = %e, "Stream aborted");
                let (_, usage) = self.summary();
                self.recorder
                    .output("error".to_string(), error_message(&e.to_string()), Some(usage))
                    .await;
                Err(GatewayError::Upstream(e))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, chunk: &StreamChunk) {
        if self.id.is_empty() {
            self.id = chunk.id.clone();
            self.created = chunk.created;
            self.model = chunk.model.clone();
        }
        self.content.push_str(&chunk.delta_content);
        if let Some(reason) = &chunk.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
        if let Some(usage) = &chunk.usage {
            self.usage.accumulate(usage);
        }
    }

    /// Assembled answer so far plus its usage entry
    fn summary(&self) -> (String, UsageEntry) {
        let finish_reason = self.finish_reason.clone().unwrap_or_else(|| "null".to_string());
        let response = ChatCompletionResponse::assistant(
            self.id.clone(),
            self.created,
            self.model.clone(),
            self.content.clone(),
            finish_reason.clone(),
            self.usage,
        );
        let message = serde_json::to_string(&response).unwrap_or_default();
        let usage = UsageEntry {
            model: self.model.clone(),
            usage: self.usage,
            finish_reason,
        };
        (message, usage)
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stream.close();
        warn!(request_id = %self.request_id, "Client disconnected mid-stream");

        if tokio::runtime::Handle::try_current().is_ok() {
            let (message, usage) = self.summary();
            self.recorder
                .output_detached(self.recorder.completion_type(), message, Some(usage));
        }
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("request_id", &self.request_id)
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Error text wrapped as JSON for the audit trail
pub(crate) fn error_message(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
