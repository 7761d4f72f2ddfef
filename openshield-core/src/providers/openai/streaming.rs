//! Streaming support for OpenAI responses

use super::converter::from_openai_stream_chunk;
use super::types::OpenAIStreamChunk;
use crate::providers::stream::{StreamEvent, StreamGrammar};

/// OpenAI sends one chunk object per `data:` line and ends with `[DONE]`
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAIGrammar;

impl StreamGrammar for OpenAIGrammar {
    fn classify(&self, payload: &str) -> Result<StreamEvent, serde_json::Error> {
        let chunk: OpenAIStreamChunk = serde_json::from_str(payload)?;
        Ok(from_openai_stream_chunk(chunk))
    }
}
