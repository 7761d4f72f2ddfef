//! Detached audit and usage writes
//!
//! Every write runs in its own spawned task so it completes even when the
//! request future is dropped by a client disconnect. Callers on the happy path
//! await the returned handle to keep the trail ordered.

use super::context::RequestContext;
use crate::audit::{AuditRecord, AuditSink, MessageType, UsageRecord};
use crate::protocol::Usage;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

/// Usage to attach to an output record
#[derive(Debug, Clone)]
pub(crate) struct UsageEntry {
    pub model: String,
    pub usage: Usage,
    pub finish_reason: String,
}

/// Audit writer bound to one request
#[derive(Clone)]
pub(crate) struct Recorder {
    sink: Arc<dyn AuditSink>,
    ctx: RequestContext,
    audit_enabled: bool,
    usage_enabled: bool,
}

impl Recorder {
    pub fn new(
        sink: Arc<dyn AuditSink>,
        ctx: RequestContext,
        audit_enabled: bool,
        usage_enabled: bool,
    ) -> Self {
        Self {
            sink,
            ctx,
            audit_enabled,
            usage_enabled,
        }
    }

    /// Input record, type `<provider>_create_message`
    pub async fn input(&self, message: String) {
        let log_type = format!("{}_create_message", self.ctx.provider);
        let _ = self.spawn(log_type, MessageType::Input, message, None).await;
    }

    /// Output record, optionally followed by a usage record linked to it
    pub async fn output(&self, log_type: String, message: String, usage: Option<UsageEntry>) {
        let _ = self.spawn(log_type, MessageType::Output, message, usage).await;
    }

    /// Output record for a provider or cached answer
    pub fn completion_type(&self) -> String {
        format!("{}_chat_completion", self.ctx.provider)
    }

    /// Fire-and-forget output write
    pub fn output_detached(&self, log_type: String, message: String, usage: Option<UsageEntry>) {
        drop(self.spawn(log_type, MessageType::Output, message, usage));
    }

    fn spawn(
        &self,
        log_type: String,
        message_type: MessageType,
        message: String,
        usage: Option<UsageEntry>,
    ) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let ctx = self.ctx.clone();
        let audit_enabled = self.audit_enabled;
        let usage = usage.filter(|_| self.usage_enabled);

        tokio::spawn(async move {
            let mut audit_log_id: Option<Uuid> = None;
            if audit_enabled {
                let record = AuditRecord {
                    id: Uuid::new_v4(),
                    message,
                    log_type,
                    message_type,
                    api_key_id: ctx.api_key_id,
                    ip_address: ctx.ip_address.clone(),
                    request_id: ctx.request_id.clone(),
                    product_id: ctx.product_id,
                    created_at: Utc::now(),
                };
                match sink.insert_audit_log(&record).await {
                    Ok(id) => audit_log_id = Some(id),
                    Err(e) => error!(
                        request_id = %ctx.request_id,
                        error = %e,
                        message_type = %message_type,
                        "Failed to store audit log"
                    ),
                }
            } else {
                debug!(request_id = %ctx.request_id, "Audit logging is disabled");
            }

            if let Some(entry) = usage {
                let record = UsageRecord::chat_completion(
                    entry.model,
                    entry.usage,
                    entry.finish_reason,
                    ctx.product_id,
                    audit_log_id,
                );
                if let Err(e) = sink.insert_usage(&record).await {
                    error!(request_id = %ctx.request_id, error = %e, "Failed to store usage");
                }
            }
        })
    }
}
