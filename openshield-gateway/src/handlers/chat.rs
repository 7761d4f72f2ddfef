use super::{json_reply, request_context, CACHE_STATUS_HEADER};
use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderValue;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;
use futures::stream::{self, Stream};
use openshield_core::orchestrator::{CacheStatus, StreamSession};
use openshield_core::ChatReply;
use std::convert::Infallible;
use tracing::warn;

/// `POST /{provider}/v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = request_context(&caller, provider);
    let reply = state
        .orchestrator
        .chat_completion(&ctx, &body)
        .await
        .map_err(|e| ApiError::new(e, caller.request_id.clone()))?;

    Ok(match reply {
        ChatReply::Complete(reply) => json_reply(reply),
        ChatReply::Stream(session) => {
            let mut response = Sse::new(sse_events(session, caller.request_id)).into_response();
            response.headers_mut().insert(
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(CacheStatus::Bypass.as_str()),
            );
            response
        }
    })
}

enum Phase {
    Streaming(StreamSession),
    Done,
}

/// `data: {chunk}` per chunk, then `data: [DONE]`
///
/// A mid-stream failure emits one `error` event and ends the body; chunks
/// already sent stay sent. Dropping the body (client gone) drops the session,
/// which records the partial answer.
fn sse_events(
    session: StreamSession,
    request_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Phase::Streaming(session), move |phase| {
        let request_id = request_id.clone();
        async move {
            let mut session = match phase {
                Phase::Streaming(session) => session,
                Phase::Done => return None,
            };
            match session.next_chunk().await {
                Ok(Some(chunk)) => {
                    let data = serde_json::to_string(&chunk.to_wire()).unwrap_or_default();
                    Some((Ok(Event::default().data(data)), Phase::Streaming(session)))
                }
                Ok(None) => Some((Ok(Event::default().data("[DONE]")), Phase::Done)),
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Closing stream after upstream failure");
                    let body = serde_json::to_string(&e.body(Some(&request_id))).unwrap_or_default();
                    Some((Ok(Event::default().event("error").data(body)), Phase::Done))
                }
            }
        }
    })
}
