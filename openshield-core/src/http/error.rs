//! HTTP error mapping utilities

use crate::providers::ProviderError;
use reqwest::StatusCode;
use serde_json::Value;

/// Map HTTP status code and response body to a ProviderError
pub fn map_http_error(status: StatusCode, body: Option<String>) -> ProviderError {
    let error_message = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_message(&v))
        .or_else(|| body.clone().filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Authentication(error_message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidRequest(error_message)
        }
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound(error_message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::Timeout(error_message)
        }
        status => ProviderError::Upstream {
            status: status.as_u16(),
            message: error_message,
        },
    }
}

/// Extract the human readable message from common error body shapes
fn extract_error_message(json: &Value) -> Option<String> {
    // OpenAI and Anthropic: { "error": { "message": "...", "type": "..." } }
    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    // Hugging Face: { "error": "..." }
    if let Some(error) = json.get("error").and_then(Value::as_str) {
        return Some(error.to_string());
    }

    // Generic: { "message": "..." } or FastAPI { "detail": "..." }
    json.get("message")
        .or_else(|| json.get("detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
