//! HTTP surface of the OpenShield gateway
//!
//! An axum router in front of [`openshield_core::Orchestrator`]: bearer-key
//! authentication, request ids, OpenAI-style error bodies and SSE framing of
//! streamed completions. Process bootstrap lives in the `openshield` binary.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
