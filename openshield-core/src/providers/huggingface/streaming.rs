//! Streaming support for Hugging Face text generation

use super::converter::from_huggingface_stream_event;
use super::types::HuggingFaceStreamEvent;
use crate::providers::stream::{StreamEvent, StreamGrammar};

/// One token object per `data:` line, the last one carrying `generated_text`
#[derive(Debug, Default, Clone, Copy)]
pub struct HuggingFaceGrammar;

impl StreamGrammar for HuggingFaceGrammar {
    fn classify(&self, payload: &str) -> Result<StreamEvent, serde_json::Error> {
        let event: HuggingFaceStreamEvent = serde_json::from_str(payload)?;
        Ok(from_huggingface_stream_event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::stream::test_support::sse_body;
    use crate::providers::{ChatStream, StreamDecoder};

    #[tokio::test]
    async fn test_stream_uses_one_generated_id() {
        let body = sse_body(&[
            "data:{\"token\":{\"id\":1,\"text\":\"Hel\",\"special\":false},\"generated_text\":null,\"details\":null}\n\n",
            "data:{\"token\":{\"id\":2,\"text\":\"lo\",\"special\":false},\"generated_text\":null,\"details\":null}\n\n",
            "data:{\"token\":{\"id\":3,\"text\":\"!\",\"special\":false},\"generated_text\":\"Hello!\",\"details\":{\"finish_reason\":\"length\",\"generated_tokens\":3}}\n\n",
        ]);
        let decoder = StreamDecoder::new(HuggingFaceGrammar, "gpt2").with_fallback_id("hf-fixed");
        let mut stream = ChatStream::new(body, decoder);

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.recv().await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.id == "hf-fixed" && c.model == "gpt2"));
        assert_eq!(chunks[2].delta_content, "!");
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("length"));
    }
}
