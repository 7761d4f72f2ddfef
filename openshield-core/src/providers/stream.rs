//! Streaming normalizer shared by every vendor
//!
//! Upstream bodies are framed as server-sent events. `eventsource-stream` handles
//! the `data:` framing; a [`StreamDecoder`] then classifies each payload through a
//! vendor [`StreamGrammar`] and turns it into at most one [`StreamChunk`].
//!
//! The decoder remembers the stream id and model, captured from the first event
//! that carries them. The chunk carrying the finish reason is held back until the
//! stream ends, so usage reported after it (OpenAI sends a separate choice-less
//! chunk) lands on the final chunk. A payload that fails to parse ends the stream
//! with an error; there is no attempt to resynchronize.

use crate::protocol::{StreamChunk, Usage};
use crate::providers::{ProviderError, ProviderResult};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::fmt;

/// Payload that marks the end of an OpenAI-style stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental content event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaEvent {
    pub id: Option<String>,
    pub model: Option<String>,
    pub created: Option<i64>,
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Vendor-neutral classification of one stream payload
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Opening event carrying the stream identity
    Start {
        id: Option<String>,
        model: Option<String>,
        usage: Option<Usage>,
    },
    /// Content delta; a closing delta carries the finish reason
    Delta(DeltaEvent),
    /// Token counts reported on their own
    Usage(Usage),
    /// Vendor stop signal; ends the stream without emitting anything
    Stop,
    /// Heartbeats and bookkeeping events with nothing for the client
    Skip,
}

/// Maps one vendor payload to a [`StreamEvent`]
pub trait StreamGrammar: Send + Sync + 'static {
    fn classify(&self, payload: &str) -> Result<StreamEvent, serde_json::Error>;
}

/// Per-stream state machine over classified payloads
pub struct StreamDecoder {
    grammar: Box<dyn StreamGrammar>,
    id: Option<String>,
    model: Option<String>,
    fallback_id: String,
    fallback_model: String,
    /// Usage not yet attached to a chunk
    pending_usage: Option<Usage>,
    /// Closing chunk waiting for the end of the stream
    held: Option<StreamChunk>,
    finished: bool,
}

impl StreamDecoder {
    /// Create a decoder; `fallback_model` is used until the vendor names one
    pub fn new(grammar: impl StreamGrammar, fallback_model: impl Into<String>) -> Self {
        Self {
            grammar: Box::new(grammar),
            id: None,
            model: None,
            fallback_id: String::new(),
            fallback_model: fallback_model.into(),
            pending_usage: None,
            held: None,
            finished: false,
        }
    }

    /// Id to report when the vendor never sends one
    pub fn with_fallback_id(mut self, id: impl Into<String>) -> Self {
        self.fallback_id = id.into();
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Mark the stream as ended; later payloads are ignored and nothing held is emitted
    pub fn finish(&mut self) {
        self.finished = true;
        self.held = None;
        self.pending_usage = None;
    }

    /// End the stream normally, releasing the held closing chunk
    ///
    /// Usage that never found a chunk is reported on an empty one.
    pub fn flush(&mut self) -> Option<StreamChunk> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let pending = self.pending_usage.take();
        match self.held.take() {
            Some(mut chunk) => {
                if let Some(usage) = pending {
                    merge_usage(&mut chunk.usage, usage);
                }
                Some(chunk)
            }
            None => pending.map(|usage| self.chunk(String::new(), None, None, Some(usage))),
        }
    }

    /// Decode one `data:` payload
    pub fn decode(&mut self, payload: &str) -> ProviderResult<Option<StreamChunk>> {
        if self.finished {
            return Ok(None);
        }

        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(None);
        }
        if payload == DONE_SENTINEL {
            return Ok(self.flush());
        }

        let event = match self.grammar.classify(payload) {
            Ok(event) => event,
            Err(e) => {
                self.finished = true;
                return Err(ProviderError::StreamDecode(format!("{}: {}", e, payload)));
            }
        };

        match event {
            StreamEvent::Start { id, model, usage } => {
                self.capture(id, model);
                if let Some(usage) = usage {
                    self.add_usage(usage);
                }
                Ok(None)
            }
            StreamEvent::Usage(usage) => {
                self.add_usage(usage);
                Ok(None)
            }
            StreamEvent::Delta(delta) => {
                self.capture(delta.id, delta.model);
                let chunk = self.chunk(
                    delta.content,
                    delta.finish_reason,
                    delta.created,
                    delta.usage,
                );
                // Once a closing chunk is held, later chunks queue behind it
                if chunk.finish_reason.is_some() || self.held.is_some() {
                    Ok(self.held.replace(chunk))
                } else {
                    Ok(Some(chunk))
                }
            }
            StreamEvent::Stop => Ok(self.flush()),
            StreamEvent::Skip => Ok(None),
        }
    }

    fn add_usage(&mut self, usage: Usage) {
        match self.held.as_mut() {
            Some(chunk) => merge_usage(&mut chunk.usage, usage),
            None => merge_usage(&mut self.pending_usage, usage),
        }
    }

    fn capture(&mut self, id: Option<String>, model: Option<String>) {
        if self.id.is_none() {
            self.id = id.filter(|s| !s.is_empty());
        }
        if self.model.is_none() {
            self.model = model.filter(|s| !s.is_empty());
        }
    }

    fn chunk(
        &self,
        content: String,
        finish_reason: Option<String>,
        created: Option<i64>,
        usage: Option<Usage>,
    ) -> StreamChunk {
        StreamChunk {
            id: self.id.clone().unwrap_or_else(|| self.fallback_id.clone()),
            created: created.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.fallback_model.clone()),
            delta_content: content,
            finish_reason: finish_reason.filter(|s| !s.is_empty()),
            usage,
        }
    }
}

fn merge_usage(slot: &mut Option<Usage>, usage: Usage) {
    match slot {
        Some(existing) => existing.accumulate(&usage),
        None => *slot = Some(usage),
    }
}

impl fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Handle over one upstream stream
///
/// `recv` pulls exactly as much of the body as it needs for the next chunk.
/// After the end of the stream, or after an error, it keeps returning `Ok(None)`.
pub struct ChatStream {
    events: Option<BoxStream<'static, ProviderResult<String>>>,
    decoder: StreamDecoder,
}

impl ChatStream {
    /// Wrap a raw byte stream (usually `reqwest::Response::bytes_stream`)
    pub fn new<S, B, E>(body: S, decoder: StreamDecoder) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let events = body
            .eventsource()
            .map(|result| match result {
                Ok(event) => Ok(event.data),
                Err(EventStreamError::Transport(e)) => Err(ProviderError::Network(e.to_string())),
                Err(e) => Err(ProviderError::StreamDecode(e.to_string())),
            })
            .boxed();

        Self {
            events: Some(events),
            decoder,
        }
    }

    /// Next chunk, `Ok(None)` at end of stream
    pub async fn recv(&mut self) -> ProviderResult<Option<StreamChunk>> {
        loop {
            if self.decoder.is_finished() {
                self.events = None;
                return Ok(None);
            }
            let Some(events) = self.events.as_mut() else {
                return Ok(None);
            };

            match events.next().await {
                None => {
                    if let Some(chunk) = self.decoder.flush() {
                        return Ok(Some(chunk));
                    }
                }
                Some(Err(e)) => {
                    self.close();
                    return Err(e);
                }
                Some(Ok(data)) => {
                    if let Some(chunk) = self.decoder.decode(&data)? {
                        return Ok(Some(chunk));
                    }
                }
            }
        }
    }

    /// Release the upstream connection
    pub fn close(&mut self) {
        self.decoder.finish();
        self.events = None;
    }
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("decoder", &self.decoder)
            .field("open", &self.events.is_some())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sse_body;
    use super::*;
    use serde_json::Value;

    /// Minimal grammar: `{"t":"start"|"delta"|"end"|"stop"|"ping", ...}`
    struct TestGrammar;

    impl StreamGrammar for TestGrammar {
        fn classify(&self, payload: &str) -> Result<StreamEvent, serde_json::Error> {
            let v: Value = serde_json::from_str(payload)?;
            let text = |k: &str| v.get(k).and_then(Value::as_str).map(str::to_string);
            Ok(match v["t"].as_str().unwrap_or_default() {
                "start" => StreamEvent::Start {
                    id: text("id"),
                    model: text("model"),
                    usage: v.get("in").and_then(Value::as_u64).map(|n| Usage::new(n as u32, 0)),
                },
                "usage" => StreamEvent::Usage(Usage::new(
                    v["in"].as_u64().unwrap_or_default() as u32,
                    v["out"].as_u64().unwrap_or_default() as u32,
                )),
                "delta" => StreamEvent::Delta(DeltaEvent {
                    id: text("id"),
                    content: text("c").unwrap_or_default(),
                    ..Default::default()
                }),
                "end" => StreamEvent::Delta(DeltaEvent {
                    finish_reason: text("reason"),
                    ..Default::default()
                }),
                "stop" => StreamEvent::Stop,
                _ => StreamEvent::Skip,
            })
        }
    }

    #[test]
    fn test_decoder_captures_identity_once() {
        let mut decoder = StreamDecoder::new(TestGrammar, "fallback");
        decoder
            .decode(r#"{"t":"start","id":"msg_1","model":"claude"}"#)
            .unwrap();
        let chunk = decoder
            .decode(r#"{"t":"delta","id":"other","c":"Hi"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.id, "msg_1");
        assert_eq!(chunk.model, "claude");
        assert_eq!(chunk.delta_content, "Hi");
        assert_eq!(chunk.finish_reason, None);
    }

    #[test]
    fn test_decoder_uses_fallbacks() {
        let mut decoder = StreamDecoder::new(TestGrammar, "gpt2").with_fallback_id("hf-1");
        let chunk = decoder.decode(r#"{"t":"delta","c":"x"}"#).unwrap().unwrap();
        assert_eq!(chunk.id, "hf-1");
        assert_eq!(chunk.model, "gpt2");
    }

    #[test]
    fn test_done_sentinel_is_terminal() {
        let mut decoder = StreamDecoder::new(TestGrammar, "m");
        assert!(decoder.decode("[DONE]").unwrap().is_none());
        assert!(decoder.is_finished());
        assert!(decoder.decode(r#"{"t":"delta","c":"late"}"#).unwrap().is_none());
    }

    #[test]
    fn test_malformed_payload_is_fatal() {
        let mut decoder = StreamDecoder::new(TestGrammar, "m");
        let err = decoder.decode("{broken").unwrap_err();
        assert!(matches!(err, ProviderError::StreamDecode(_)));
        assert!(decoder.is_finished());
    }

    #[tokio::test]
    async fn test_stream_ends_with_finish_reason_then_end_of_stream() {
        let body = sse_body(&[
            "data: {\"t\":\"start\",\"id\":\"s1\",\"model\":\"m\"}\n\n",
            "data: {\"t\":\"ping\"}\n\ndata: {\"t\":\"del",
            "ta\",\"c\":\"Hel\"}\n\n",
            "data: {\"t\":\"delta\",\"c\":\"lo\"}\n\n",
            "data: {\"t\":\"end\",\"reason\":\"stop\"}\n\n",
            "data: {\"t\":\"stop\"}\n\n",
        ]);
        let mut stream = ChatStream::new(body, StreamDecoder::new(TestGrammar, "m"));

        let mut text = String::new();
        let mut last = None;
        while let Some(chunk) = stream.recv().await.unwrap() {
            text.push_str(&chunk.delta_content);
            last = Some(chunk);
        }
        assert_eq!(text, "Hello");
        assert_eq!(last.unwrap().finish_reason.as_deref(), Some("stop"));

        // End of stream is sticky
        assert!(stream.recv().await.unwrap().is_none());
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_closing_chunk_waits_for_trailing_usage() {
        let mut decoder = StreamDecoder::new(TestGrammar, "m");
        assert!(decoder.decode(r#"{"t":"delta","c":"Hi"}"#).unwrap().is_some());
        assert!(decoder.decode(r#"{"t":"end","reason":"stop"}"#).unwrap().is_none());
        assert!(decoder.decode(r#"{"t":"usage","in":9,"out":2}"#).unwrap().is_none());

        let last = decoder.decode("[DONE]").unwrap().unwrap();
        assert_eq!(last.finish_reason.as_deref(), Some("stop"));
        assert_eq!(last.usage, Some(Usage::new(9, 2)));
        assert!(decoder.is_finished());
        assert!(decoder.flush().is_none());
    }

    #[test]
    fn test_start_usage_does_not_emit_a_chunk() {
        let mut decoder = StreamDecoder::new(TestGrammar, "m");
        assert!(decoder
            .decode(r#"{"t":"start","id":"s1","in":12}"#)
            .unwrap()
            .is_none());
        let first = decoder.decode(r#"{"t":"delta","c":"Hi"}"#).unwrap().unwrap();
        assert_eq!(first.delta_content, "Hi");
        assert_eq!(first.usage, None);

        assert!(decoder.decode(r#"{"t":"end","reason":"stop"}"#).unwrap().is_none());
        let last = decoder.decode(r#"{"t":"stop"}"#).unwrap().unwrap();
        assert_eq!(last.id, "s1");
        assert_eq!(last.usage, Some(Usage::new(12, 0)));
    }

    #[test]
    fn test_usage_without_any_closing_chunk_is_still_reported() {
        let mut decoder = StreamDecoder::new(TestGrammar, "m");
        decoder.decode(r#"{"t":"delta","c":"a"}"#).unwrap();
        decoder.decode(r#"{"t":"usage","in":3,"out":1}"#).unwrap();
        let tail = decoder.flush().unwrap();
        assert_eq!(tail.delta_content, "");
        assert_eq!(tail.finish_reason, None);
        assert_eq!(tail.usage, Some(Usage::new(3, 1)));
    }

    #[tokio::test]
    async fn test_closing_chunk_released_when_body_ends() {
        let body = sse_body(&[
            "data: {\"t\":\"delta\",\"c\":\"a\"}\n\n",
            "data: {\"t\":\"end\",\"reason\":\"length\"}\n\n",
        ]);
        let mut stream = ChatStream::new(body, StreamDecoder::new(TestGrammar, "m"));
        assert_eq!(stream.recv().await.unwrap().unwrap().delta_content, "a");
        let last = stream.recv().await.unwrap().unwrap();
        assert_eq!(last.finish_reason.as_deref(), Some("length"));
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_error_then_end() {
        let body = sse_body(&["data: {\"t\":\"delta\",\"c\":\"a\"}\n\n", "data: nope\n\n"]);
        let mut stream = ChatStream::new(body, StreamDecoder::new(TestGrammar, "m"));

        assert!(stream.recv().await.unwrap().is_some());
        assert!(stream.recv().await.is_err());
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_stops_reading() {
        let body = sse_body(&["data: {\"t\":\"delta\",\"c\":\"a\"}\n\n"]);
        let mut stream = ChatStream::new(body, StreamDecoder::new(TestGrammar, "m"));
        stream.close();
        assert!(stream.recv().await.unwrap().is_none());
    }
}
