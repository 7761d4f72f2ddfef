//! Conversion between the canonical protocol and OpenAI format

use super::types::*;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, MessageRole, Usage};
use crate::providers::stream::{DeltaEvent, StreamEvent};

/// Convert a canonical request to OpenAI format
pub fn to_openai_request(request: &ChatCompletionRequest) -> OpenAIRequest {
    OpenAIRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_openai_message).collect(),
        max_tokens: request.max_tokens,
        stream: request.stream.then_some(true),
        stream_options: request
            .stream
            .then_some(OpenAIStreamOptions { include_usage: true }),
    }
}

fn to_openai_message(message: &ChatMessage) -> OpenAIMessage {
    OpenAIMessage {
        role: message.role.as_str().to_string(),
        content: Some(message.content.clone()),
    }
}

fn from_openai_role(role: &str) -> MessageRole {
    match role {
        "system" | "developer" => MessageRole::System,
        "user" => MessageRole::User,
        "tool" | "function" => MessageRole::Tool,
        _ => MessageRole::Assistant,
    }
}

impl From<OpenAIUsage> for Usage {
    fn from(usage: OpenAIUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage
                .total_tokens
                .max(usage.prompt_tokens.saturating_add(usage.completion_tokens)),
        }
    }
}

/// Convert an OpenAI response to the canonical format
pub fn from_openai_response(response: OpenAIResponse) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: response.id,
        object: crate::protocol::COMPLETION_OBJECT.to_string(),
        created: response.created,
        model: response.model,
        choices: response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: ChatMessage::new(
                    from_openai_role(&choice.message.role),
                    choice.message.content.unwrap_or_default(),
                ),
                finish_reason: choice.finish_reason.unwrap_or_default(),
            })
            .collect(),
        usage: response.usage.map(Usage::from).unwrap_or_default(),
    }
}

/// Classify an OpenAI stream chunk
///
/// Chunks with a choice are deltas; the one carrying `finish_reason` closes the
/// answer. The trailing usage chunk has no choices and only reports tokens.
pub fn from_openai_stream_chunk(chunk: OpenAIStreamChunk) -> StreamEvent {
    let choice = chunk.choices.into_iter().next();
    let usage = chunk.usage.map(Usage::from);

    let Some(choice) = choice else {
        return match usage {
            Some(usage) => StreamEvent::Usage(usage),
            None => StreamEvent::Skip,
        };
    };

    let content = choice.delta.content.unwrap_or_default();
    let finish_reason = choice.finish_reason;

    StreamEvent::Delta(DeltaEvent {
        id: chunk.id,
        model: chunk.model,
        created: chunk.created,
        content,
        finish_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_conversion() {
        let request = ChatCompletionRequest::new(
            "gpt-4",
            vec![
                ChatMessage::system("You are a helpful assistant"),
                ChatMessage::user("Hello, how are you?"),
            ],
        )
        .with_max_tokens(100);

        let openai_req = to_openai_request(&request);
        assert_eq!(openai_req.model, "gpt-4");
        assert_eq!(openai_req.messages.len(), 2);
        assert_eq!(openai_req.messages[0].role, "system");
        assert_eq!(openai_req.messages[1].role, "user");
        assert_eq!(openai_req.max_tokens, Some(100));
        assert!(openai_req.stream.is_none());
        assert!(openai_req.stream_options.is_none());

        let streaming = to_openai_request(&request.with_streaming(true));
        assert_eq!(streaming.stream, Some(true));
        assert!(streaming.stream_options.unwrap().include_usage);
    }

    #[test]
    fn test_response_conversion_zero_fills_usage() {
        let body = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1234567890,
            "model": "gpt-4",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}, "finish_reason": "stop"}]
        }"#;
        let response = from_openai_response(serde_json::from_str(body).unwrap());
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.content(), Some("Hi"));
        assert_eq!(response.finish_reason(), "stop");
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn test_stream_chunk_classification() {
        let delta: OpenAIStreamChunk = serde_json::from_str(
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        )
        .unwrap();
        match from_openai_stream_chunk(delta) {
            StreamEvent::Delta(d) => {
                assert_eq!(d.content, "Hel");
                assert_eq!(d.id.as_deref(), Some("c1"));
                assert!(d.finish_reason.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let usage: OpenAIStreamChunk = serde_json::from_str(
            r#"{"id":"c1","created":1,"model":"gpt-4","choices":[],"usage":{"prompt_tokens":9,"completion_tokens":3,"total_tokens":12}}"#,
        )
        .unwrap();
        match from_openai_stream_chunk(usage) {
            StreamEvent::Usage(u) => assert_eq!(u, Usage::new(9, 3)),
            other => panic!("unexpected {:?}", other),
        }

        let empty: OpenAIStreamChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(from_openai_stream_chunk(empty), StreamEvent::Skip);
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage: OpenAIUsage = serde_json::from_str(
            r#"{"prompt_tokens":4294967295,"completion_tokens":10,"total_tokens":0}"#,
        )
        .unwrap();
        let usage = Usage::from(usage);
        assert_eq!(usage.completion_tokens, 10);
        assert_eq!(usage.total_tokens, u32::MAX);
    }
}
