//! Cache error types

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Failures of a cache backend
///
/// Callers never surface these to clients: both cache tiers fail open.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache entry could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Context service returned status {status}")]
    Remote { status: u16 },

    #[error("Context service unreachable: {0}")]
    Transport(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Transport(err.to_string())
    }
}
