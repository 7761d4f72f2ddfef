//! OpenShield Core Library
//!
//! Request orchestration for the OpenShield LLM gateway: vendor adapters with a
//! shared streaming normalizer, the flat and conversational caches, the ordered
//! input rule pipeline and the audit trail, composed by [`orchestrator::Orchestrator`].

pub mod audit;
pub mod cache;
pub mod config;
pub mod http;
pub mod orchestrator;
pub mod protocol;
pub mod providers;
pub mod rules;

pub use orchestrator::{ChatReply, GatewayError, Orchestrator, RequestContext};

/// Returns the version of the OpenShield core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
