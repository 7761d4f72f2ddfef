//! Canonical chat types shared by every provider, cache tier and rule check
//!
//! The gateway speaks one wire shape to its clients regardless of the vendor
//! behind it. The types here are that shape:
//! - `ChatCompletionRequest` as decoded from the client body
//! - `ChatCompletionResponse` for synchronous answers
//! - `StreamChunk` for incremental answers, rendered as `ChatCompletionChunk` on the wire

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Object tag of a synchronous completion
pub const COMPLETION_OBJECT: &str = "chat.completion";

/// Object tag of a streamed completion chunk
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
    /// Tool response
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool message
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// Reasons a decoded request is rejected before any policy check runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("you must provide a model parameter")]
    MissingModel,

    #[error("messages must be a non-empty array")]
    EmptyMessages,

    #[error("no user message found in the request")]
    NoUserMessage,
}

impl RequestError {
    /// Name of the offending request field
    pub fn param(&self) -> &'static str {
        match self {
            RequestError::MissingModel => "model",
            RequestError::EmptyMessages | RequestError::NoUserMessage => "messages",
        }
    }
}

/// Chat completion request
///
/// Once a request has been handed to a provider it is never mutated; the rule
/// pipeline produces a redacted copy through [`ChatCompletionRequest::with_messages`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier to use
    #[serde(default)]
    pub model: String,

    /// Messages in the conversation, in order
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether the client asked for an event stream
    #[serde(default)]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a new non-streaming request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            stream: false,
        }
    }

    /// Set maximum tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable or disable streaming
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Copy of this request with a replaced message sequence
    pub fn with_messages(&self, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            stream: self.stream,
        }
    }

    /// Check the shape every downstream stage relies on
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.model.trim().is_empty() {
            return Err(RequestError::MissingModel);
        }
        if self.messages.is_empty() {
            return Err(RequestError::EmptyMessages);
        }
        if self.first_user_index().is_none() {
            return Err(RequestError::NoUserMessage);
        }
        Ok(())
    }

    /// Index of the first user-role message
    pub fn first_user_index(&self) -> Option<usize> {
        self.messages.iter().position(ChatMessage::is_user)
    }

    /// Content of the most recent user-role message, empty when there is none
    pub fn last_user_message(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// All user-role contents joined with a single space
    pub fn user_prompt(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.is_user())
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Deterministic key material for the flat response cache
    ///
    /// Field order is fixed by the struct definition so two equal requests
    /// always serialize to the same bytes.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{}-{:?}-{:?}-{}", self.model, self.messages, self.max_tokens, self.stream)
        })
    }
}

/// Token accounting for one completion
///
/// Always populated; providers that do not report usage fill zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Fold another usage report into this one
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.prompt_tokens.saturating_add(self.completion_tokens);
    }
}

/// One alternative of a synchronous completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: String,
}

/// Chat completion response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default = "default_completion_object")]
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
}

fn default_completion_object() -> String {
    COMPLETION_OBJECT.to_string()
}

impl ChatCompletionResponse {
    /// Single-choice assistant answer
    pub fn assistant(
        id: impl Into<String>,
        created: i64,
        model: impl Into<String>,
        content: impl Into<String>,
        finish_reason: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            object: COMPLETION_OBJECT.to_string(),
            created,
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: finish_reason.into(),
            }],
            usage,
        }
    }

    /// Content of the first choice
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }

    /// Finish reason of the first choice
    pub fn finish_reason(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.finish_reason.as_str())
            .unwrap_or("")
    }
}

/// One incremental unit of a streamed completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub delta_content: String,
    pub finish_reason: Option<String>,
    /// Usage reported by the vendor alongside this event, if any
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// Render the chunk in the client-facing wire shape
    pub fn to_wire(&self) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: self.delta_content.clone(),
                },
                finish_reason: self.finish_reason.clone(),
            }],
            usage: self.usage,
        }
    }
}

/// Wire shape of a streamed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: String,
}
