//! Hugging Face inference provider
//!
//! The text-generation endpoint takes a flat prompt, so the conversation is
//! rendered as a `role: content` transcript. Responses carry no id or usage.

mod client;
pub mod converter;
mod streaming;
pub mod types;

pub use client::HuggingFaceProvider;
pub use streaming::HuggingFaceGrammar;
