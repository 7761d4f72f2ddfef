//! Conversion between the canonical protocol and the Anthropic Messages API

use super::types::*;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, MessageRole, Usage};
use crate::providers::stream::{DeltaEvent, StreamEvent};

/// Convert a canonical request; system messages are lifted into `system`
pub fn to_anthropic_request(request: &ChatCompletionRequest) -> AnthropicRequest {
    let mut system_parts = Vec::new();
    let mut messages = Vec::with_capacity(request.messages.len());

    for message in &request.messages {
        match message.role {
            MessageRole::System => system_parts.push(message.content.as_str()),
            MessageRole::Assistant => messages.push(AnthropicMessage {
                role: "assistant",
                content: message.content.clone(),
            }),
            // Tool results travel as user turns
            MessageRole::User | MessageRole::Tool => messages.push(AnthropicMessage {
                role: "user",
                content: message.content.clone(),
            }),
        }
    }

    AnthropicRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n")),
        stream: request.stream,
    }
}

/// Map Anthropic stop reasons onto the OpenAI vocabulary
pub fn normalize_stop_reason(reason: &str) -> String {
    match reason {
        "end_turn" | "stop_sequence" => "stop".to_string(),
        "max_tokens" => "length".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    }
}

impl From<AnthropicUsage> for Usage {
    fn from(usage: AnthropicUsage) -> Self {
        Usage::new(usage.input_tokens, usage.output_tokens)
    }
}

/// Convert an Anthropic response to the canonical format
pub fn from_anthropic_response(response: AnthropicResponse, created: i64) -> ChatCompletionResponse {
    let content: String = response
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    let finish_reason = response
        .stop_reason
        .as_deref()
        .map(normalize_stop_reason)
        .unwrap_or_else(|| "stop".to_string());

    ChatCompletionResponse::assistant(
        response.id,
        created,
        response.model,
        content,
        finish_reason,
        response.usage.into(),
    )
}

/// Classify one Anthropic stream event
pub fn from_anthropic_stream_event(event: AnthropicStreamEvent) -> Result<StreamEvent, String> {
    Ok(match event {
        AnthropicStreamEvent::MessageStart { message } => StreamEvent::Start {
            id: message.id,
            model: message.model,
            // Output tokens here are a placeholder; message_delta reports the total
            usage: message.usage.map(|u| Usage::new(u.input_tokens, 0)),
        },
        AnthropicStreamEvent::ContentBlockDelta { delta } => StreamEvent::Delta(DeltaEvent {
            content: delta.text.unwrap_or_default(),
            ..Default::default()
        }),
        AnthropicStreamEvent::MessageDelta { delta, usage } => StreamEvent::Delta(DeltaEvent {
            finish_reason: delta.stop_reason.as_deref().map(normalize_stop_reason),
            usage: usage.map(Usage::from),
            ..Default::default()
        }),
        AnthropicStreamEvent::MessageStop => StreamEvent::Stop,
        AnthropicStreamEvent::Error { error } => {
            return Err(format!("{}: {}", error.error_type, error.message))
        }
        AnthropicStreamEvent::Other => StreamEvent::Skip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChatMessage;

    #[test]
    fn test_system_messages_are_lifted() {
        let request = ChatCompletionRequest::new(
            "claude-3-haiku",
            vec![
                ChatMessage::system("Be brief."),
                ChatMessage::user("Hello"),
                ChatMessage::assistant("Hi"),
                ChatMessage::user("Bye"),
            ],
        );

        let converted = to_anthropic_request(&request);
        assert_eq!(converted.system.as_deref(), Some("Be brief."));
        assert_eq!(converted.messages.len(), 3);
        assert_eq!(converted.messages[0].role, "user");
        assert_eq!(converted.messages[1].role, "assistant");
        assert_eq!(converted.max_tokens, DEFAULT_MAX_TOKENS);

        let body = serde_json::to_value(&converted).unwrap();
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_response_concatenates_text_blocks() {
        let body = r#"{
            "id": "msg_01",
            "type": "message",
            "model": "claude-3-haiku",
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "there"}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;

        let response = from_anthropic_response(serde_json::from_str(body).unwrap(), 42);
        assert_eq!(response.content(), Some("Hello there"));
        assert_eq!(response.finish_reason(), "length");
        assert_eq!(response.created, 42);
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[test]
    fn test_stop_reason_normalization() {
        assert_eq!(normalize_stop_reason("end_turn"), "stop");
        assert_eq!(normalize_stop_reason("stop_sequence"), "stop");
        assert_eq!(normalize_stop_reason("max_tokens"), "length");
        assert_eq!(normalize_stop_reason("refusal"), "refusal");
    }
}
