//! Anthropic provider implementation
//!
//! Adapter for the Anthropic Messages API. System turns are lifted into the
//! top-level `system` field and stop reasons are mapped onto the OpenAI names.

mod client;
pub mod converter;
mod streaming;
pub mod types;

pub use client::AnthropicProvider;
pub use streaming::AnthropicGrammar;
