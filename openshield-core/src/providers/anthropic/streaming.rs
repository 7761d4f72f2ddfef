//! Streaming support for the Anthropic Messages API

use super::converter::from_anthropic_stream_event;
use super::types::AnthropicStreamEvent;
use crate::providers::stream::{StreamEvent, StreamGrammar};
use serde::de::Error as _;

/// Anthropic names each payload through its `type` field and ends with `message_stop`
#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicGrammar;

impl StreamGrammar for AnthropicGrammar {
    fn classify(&self, payload: &str) -> Result<StreamEvent, serde_json::Error> {
        let event: AnthropicStreamEvent = serde_json::from_str(payload)?;
        from_anthropic_stream_event(event).map_err(serde_json::Error::custom)
    }
}
