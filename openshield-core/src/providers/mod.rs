//! Provider abstraction and streaming normalizer
//!
//! Each vendor adapter translates the canonical chat protocol to and from one
//! upstream wire format. Streams from every vendor are funnelled through the
//! shared [`StreamDecoder`] so callers only ever see [`crate::protocol::StreamChunk`]s.

pub mod adapter;
pub mod anthropic;
pub mod error;
pub mod huggingface;
pub mod openai;
pub mod stream;

pub use adapter::{Provider, ProviderKind, ProviderRegistry, ProviderSettings};
pub use error::{ProviderError, ProviderResult};
pub use stream::{ChatStream, DeltaEvent, StreamDecoder, StreamEvent, StreamGrammar};

// Re-export concrete providers
pub use anthropic::AnthropicProvider;
pub use huggingface::HuggingFaceProvider;
pub use openai::OpenAIProvider;
