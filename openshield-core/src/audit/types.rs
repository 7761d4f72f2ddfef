//! Audit, usage and API key records

use crate::protocol::Usage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Direction of an audited message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Input,
    Output,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Input => "input",
            MessageType::Output => "output",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active API key resolved from a bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub api_key_id: Uuid,
    pub product_id: Uuid,
}

/// One row of `audit_logs`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Compact JSON of the audited payload
    pub message: String,
    #[serde(rename = "type")]
    pub log_type: String,
    pub message_type: MessageType,
    pub api_key_id: Uuid,
    pub ip_address: String,
    pub request_id: String,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One row of `usage`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub model: String,
    pub predicted_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub finish_reason: String,
    pub request_type: String,
    pub product_id: Uuid,
    /// Output audit record this usage belongs to
    pub audit_log_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Usage of one chat completion
    pub fn chat_completion(
        model: impl Into<String>,
        usage: Usage,
        finish_reason: impl Into<String>,
        product_id: Uuid,
        audit_log_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            predicted_tokens: 0,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            finish_reason: finish_reason.into(),
            request_type: "chat_completion".to_string(),
            product_id,
            audit_log_id,
            created_at: Utc::now(),
        }
    }
}
