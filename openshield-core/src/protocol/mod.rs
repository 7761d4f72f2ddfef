//! Protocol module for the canonical chat request/response structures
//!
//! Every vendor adapter translates to and from these types, so the rest of the
//! gateway never sees a vendor wire format.

pub mod types;

pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice,
    ChunkChoice, ChunkDelta, MessageRole, RequestError, StreamChunk, Usage, CHUNK_OBJECT,
    COMPLETION_OBJECT,
};
