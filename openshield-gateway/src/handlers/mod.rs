//! Route handlers

mod chat;
mod health;
mod models;

pub use chat::chat_completions;
pub use health::health;
pub use models::{get_model, list_models};

use crate::middleware::Caller;
use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use openshield_core::orchestrator::Reply;
use openshield_core::RequestContext;

/// `OS-Cache-Status`; header names are case-insensitive on the wire
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("os-cache-status");

fn request_context(caller: &Caller, provider: String) -> RequestContext {
    RequestContext::new(
        caller.request_id.clone(),
        provider,
        caller.api_key_id,
        caller.product_id,
        caller.ip_address.clone(),
    )
}

/// Pre-serialized JSON body plus the cache status header
fn json_reply(reply: Reply) -> Response {
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(reply.cache_status.as_str()),
            ),
        ],
        reply.body,
    )
        .into_response()
}
