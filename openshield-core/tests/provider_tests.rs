//! Provider adapters against mocked vendor endpoints

use openshield_core::http::HttpClient;
use openshield_core::protocol::{ChatCompletionRequest, ChatMessage, Usage};
use openshield_core::providers::{Provider, ProviderError, ProviderKind, ProviderSettings};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(kind: ProviderKind, base_url: String) -> Arc<dyn Provider> {
    let http = HttpClient::new().unwrap();
    kind.create_provider(ProviderSettings::new(kind.as_str(), "sk-test", base_url), http)
}

fn request(model: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new(
        model,
        vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user("Hello"),
        ],
    )
    .with_max_tokens(64)
}

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|e| format!("data: {}\n\n", e)).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4", "max_tokens": 64})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4-0613",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let openai = provider(ProviderKind::OpenAI, format!("{}/v1", server.uri()));
    let response = openai.create_chat_completion(&request("gpt-4")).await.unwrap();

    assert_eq!(response.id, "chatcmpl-1");
    assert_eq!(response.content(), Some("Hi!"));
    assert_eq!(response.finish_reason(), "stop");
    assert_eq!(response.usage, Usage::new(9, 3));
}

#[tokio::test]
async fn test_openai_stream_ends_after_stop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true, "stream_options": {"include_usage": true}})))
        .respond_with(sse(&[
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[],"usage":{"prompt_tokens":9,"completion_tokens":2,"total_tokens":11}}"#,
            "[DONE]",
        ]))
        .mount(&server)
        .await;

    let openai = provider(ProviderKind::OpenAI, format!("{}/v1", server.uri()));
    let mut stream = openai
        .create_chat_completion_stream(&request("gpt-4").with_streaming(true))
        .await
        .unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.recv().await.unwrap() {
        chunks.push(chunk);
    }

    let text: String = chunks.iter().map(|c| c.delta_content.as_str()).collect();
    assert_eq!(text, "Hello");
    // The trailing usage chunk is folded into the closing chunk
    let last = chunks.last().unwrap();
    assert_eq!(last.finish_reason.as_deref(), Some("stop"));
    assert_eq!(last.usage, Some(Usage::new(9, 2)));
    assert_eq!(chunks.iter().filter(|c| c.finish_reason.is_some()).count(), 1);
    assert_eq!(chunks.iter().filter(|c| c.usage.is_some()).count(), 1);

    // End of stream is sticky
    assert!(stream.recv().await.unwrap().is_none());
    assert!(stream.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_stream_payload_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#,
            "{not json",
            r#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"!"},"finish_reason":null}]}"#,
        ]))
        .mount(&server)
        .await;

    let openai = provider(ProviderKind::OpenAI, format!("{}/v1", server.uri()));
    let mut stream = openai
        .create_chat_completion_stream(&request("gpt-4").with_streaming(true))
        .await
        .unwrap();

    assert_eq!(stream.recv().await.unwrap().unwrap().delta_content, "Hi");
    assert!(matches!(stream.recv().await, Err(ProviderError::StreamDecode(_))));
    assert!(stream.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_upstream_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let openai = provider(ProviderKind::OpenAI, format!("{}/v1", server.uri()));
    let err = openai.create_chat_completion(&request("gpt-4")).await.unwrap_err();
    assert_eq!(err.upstream_status(), Some(503));
}

#[tokio::test]
async fn test_openai_models_are_proxied_verbatim() {
    let server = MockServer::start().await;
    let listing = r#"{"object":"list","data":[{"id":"gpt-4","object":"model"}]}"#;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(listing, "application/json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models/gpt-5"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .mount(&server)
        .await;

    let openai = provider(ProviderKind::OpenAI, format!("{}/v1", server.uri()));
    assert_eq!(openai.list_models().await.unwrap(), listing.as_bytes());
    assert!(matches!(
        openai.get_model("gpt-5").await,
        Err(ProviderError::ModelNotFound(_))
    ));
}

#[tokio::test]
async fn test_anthropic_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-haiku",
            "system": "You are a helpful assistant.",
            "messages": [{"role": "user", "content": "Hello"}],
            "max_tokens": 64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku",
            "content": [{"type": "text", "text": "Hi there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let anthropic = provider(ProviderKind::Anthropic, format!("{}/v1", server.uri()));
    let response = anthropic
        .create_chat_completion(&request("claude-3-haiku"))
        .await
        .unwrap();

    assert_eq!(response.id, "msg_1");
    assert_eq!(response.content(), Some("Hi there"));
    assert_eq!(response.finish_reason(), "stop");
    assert_eq!(response.usage.total_tokens, 14);
}

#[tokio::test]
async fn test_anthropic_stream_usage_is_not_double_counted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(&[
            r#"{"type":"message_start","message":{"id":"msg_2","model":"claude-3-haiku","usage":{"input_tokens":10,"output_tokens":1}}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Yo"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":7}}"#,
            r#"{"type":"message_stop"}"#,
        ]))
        .mount(&server)
        .await;

    let anthropic = provider(ProviderKind::Anthropic, format!("{}/v1", server.uri()));
    let mut stream = anthropic
        .create_chat_completion_stream(&request("claude-3-haiku").with_streaming(true))
        .await
        .unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.recv().await.unwrap() {
        chunks.push(chunk);
    }

    let mut usage = Usage::default();
    for u in chunks.iter().filter_map(|c| c.usage) {
        usage.accumulate(&u);
    }
    assert_eq!(usage, Usage::new(10, 7));

    // No empty chunk for message_start; everything lands on the closing chunk
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].delta_content, "Yo");
    let last = chunks.last().unwrap();
    assert_eq!(last.finish_reason.as_deref(), Some("length"));
    assert_eq!(last.usage, Some(Usage::new(10, 7)));
}

#[tokio::test]
async fn test_huggingface_generation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "inputs": "system: You are a helpful assistant.\nuser: Hello\n",
            "parameters": {"max_new_tokens": 64, "return_full_text": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"generated_text": "Hi!"}])))
        .mount(&server)
        .await;

    let hf = provider(ProviderKind::HuggingFace, server.uri());
    let response = hf.create_chat_completion(&request("gpt2")).await.unwrap();

    assert!(response.id.starts_with("hf-"));
    assert_eq!(response.content(), Some("Hi!"));
    assert_eq!(response.usage, Usage::default());
}

#[tokio::test]
async fn test_huggingface_stream_keeps_one_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gpt2"))
        .respond_with(sse(&[
            r#"{"token":{"id":1,"text":"Hi","special":false},"generated_text":null,"details":null}"#,
            r#"{"token":{"id":2,"text":" you","special":false},"generated_text":null,"details":null}"#,
            r#"{"token":{"id":0,"text":"</s>","special":true},"generated_text":"Hi you","details":{"finish_reason":"eos_token","generated_tokens":3}}"#,
        ]))
        .mount(&server)
        .await;

    let hf = provider(ProviderKind::HuggingFace, server.uri());
    let mut stream = hf
        .create_chat_completion_stream(&request("gpt2").with_streaming(true))
        .await
        .unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.recv().await.unwrap() {
        chunks.push(chunk);
    }

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].id.starts_with("hf-"));
    assert!(chunks.iter().all(|c| c.id == chunks[0].id));
    let text: String = chunks.iter().map(|c| c.delta_content.as_str()).collect();
    assert_eq!(text, "Hi you");
    assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
    assert_eq!(chunks[2].usage, Some(Usage::new(0, 3)));
}

#[tokio::test]
async fn test_huggingface_model_listing_is_unsupported() {
    let hf = provider(ProviderKind::HuggingFace, "http://127.0.0.1:9".to_string());
    assert!(matches!(
        hf.list_models().await,
        Err(ProviderError::Unsupported { .. })
    ));
}
