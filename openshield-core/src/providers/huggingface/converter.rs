//! Conversion between the canonical protocol and the Hugging Face text-generation API

use super::types::*;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse, Usage};
use crate::providers::stream::{DeltaEvent, StreamEvent};

/// Flatten the conversation into a `role: content` transcript
pub fn to_prompt(request: &ChatCompletionRequest) -> String {
    request
        .messages
        .iter()
        .map(|m| format!("{}: {}\n", m.role.as_str(), m.content))
        .collect()
}

pub fn to_huggingface_request(request: &ChatCompletionRequest) -> HuggingFaceRequest {
    HuggingFaceRequest {
        inputs: to_prompt(request),
        parameters: HuggingFaceParameters {
            max_new_tokens: request.max_tokens,
            return_full_text: false,
        },
        stream: request.stream,
    }
}

/// Fresh completion id; the API does not return one
pub fn completion_id() -> String {
    format!("hf-{}", uuid::Uuid::new_v4())
}

/// Convert the generated-text array; usage is not reported and stays zero
pub fn from_huggingface_response(
    generated: Vec<GeneratedText>,
    model: &str,
    created: i64,
) -> ChatCompletionResponse {
    let content = generated
        .into_iter()
        .next()
        .map(|g| g.generated_text)
        .unwrap_or_default();

    ChatCompletionResponse::assistant(completion_id(), created, model, content, "stop", Usage::default())
}

/// Classify one streamed token event
///
/// The event with a non-null `generated_text` closes the stream.
pub fn from_huggingface_stream_event(event: HuggingFaceStreamEvent) -> StreamEvent {
    let content = if event.token.special {
        String::new()
    } else {
        event.token.text
    };

    if event.generated_text.is_none() {
        return StreamEvent::Delta(DeltaEvent {
            content,
            ..Default::default()
        });
    }

    let details = event.details;
    let finish_reason = details
        .as_ref()
        .and_then(|d| d.finish_reason.as_deref())
        .map(|reason| match reason {
            "eos_token" | "stop_sequence" => "stop".to_string(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "stop".to_string());
    let usage = details
        .and_then(|d| d.generated_tokens)
        .map(|completion| Usage::new(0, completion));

    StreamEvent::Delta(DeltaEvent {
        content,
        finish_reason: Some(finish_reason),
        usage,
        ..Default::default()
    })
}
