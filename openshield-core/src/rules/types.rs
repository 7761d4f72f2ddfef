//! Rule service wire types and pipeline results

use crate::config::PluginConfig;
use crate::protocol::{ChatCompletionRequest, ChatMessage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from rule evaluation
#[derive(Debug, Error)]
pub enum RuleError {
    /// The request has nothing to inspect
    #[error("No user message found in the request")]
    NoUserMessage,

    #[error("Rule service unreachable: {0}")]
    Transport(String),

    #[error("Rule service returned status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Malformed rule service response: {0}")]
    Decode(String),

    #[error("Rule task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for RuleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RuleError::Decode(err.to_string())
        } else {
            RuleError::Transport(err.to_string())
        }
    }
}

/// The part of the request every rule inspects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePrompt {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl From<&ChatCompletionRequest> for RulePrompt {
    fn from(request: &ChatCompletionRequest) -> Self {
        Self {
            messages: request.messages.clone(),
            model: request.model.clone(),
            max_tokens: request.max_tokens,
        }
    }
}

/// Body of `POST /rule/execute`
#[derive(Debug, Serialize)]
pub struct RuleRequest<'a> {
    pub prompt: &'a RulePrompt,
    pub config: &'a PluginConfig,
}

/// Response of `POST /rule/execute`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleResult {
    #[serde(rename = "match", default)]
    pub matched: bool,
    #[serde(default)]
    pub inspection: Inspection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Inspection {
    #[serde(default)]
    pub check_result: bool,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub anonymized_content: Option<String>,
    /// Plugin specific, e.g. `violated_categories` for llama guard
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl Inspection {
    /// `details.violated_categories` as strings
    pub fn violated_categories(&self) -> Vec<String> {
        self.details
            .as_ref()
            .and_then(|d| d.get("violated_categories"))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Status message returned to the caller and written to the audit trail
#[derive(Debug, Serialize)]
pub(crate) struct StatusMessage<'a> {
    pub status: &'a str,
    pub rule_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violated_categories: Option<&'a [String]>,
}

impl<'a> StatusMessage<'a> {
    pub fn blocked(rule_type: &'a str) -> Self {
        Self {
            status: "blocked",
            rule_type,
            violated_categories: None,
        }
    }

    pub fn non_blocked(rule_type: &'a str) -> Self {
        Self {
            status: "non_blocked",
            rule_type,
            violated_categories: None,
        }
    }

    pub fn with_categories(mut self, categories: &'a [String]) -> Self {
        self.violated_categories = Some(categories);
        self
    }

    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecision {
    pub blocked: bool,
    /// JSON status message, or the error text of a failed rule call
    pub message: String,
    /// Messages with every committed redaction applied
    pub messages: Vec<ChatMessage>,
    /// Name of the blocking rule
    pub blocked_by: Option<String>,
}

impl RuleDecision {
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}
