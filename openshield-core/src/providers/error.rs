//! Provider error types and handling

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when interacting with LLM providers
///
/// None of these are retried: one upstream attempt per client request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Upstream rejected the request shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream returned another non-2xx status
    #[error("Upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Timeout occurred
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Response parsing error
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Malformed event in the middle of a stream
    #[error("Malformed stream event: {0}")]
    StreamDecode(String),

    /// Response exceeded the configured size limit
    #[error("Response too large: {size} bytes exceeds maximum {max}")]
    ResponseTooLarge { size: usize, max: usize },

    /// The vendor has no equivalent for this operation
    #[error("Operation not supported by {provider}: {operation}")]
    Unsupported { provider: String, operation: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// HTTP status reported by the upstream, when the error came from one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::Authentication(_) => Some(401),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ProviderError::ParseError(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Upstream {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}
