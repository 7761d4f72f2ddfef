use super::{json_reply, request_context};
use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Extension;

/// `GET /{provider}/v1/models`
pub async fn list_models(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = request_context(&caller, provider);
    let reply = state
        .orchestrator
        .list_models(&ctx)
        .await
        .map_err(|e| ApiError::new(e, caller.request_id.clone()))?;
    Ok(json_reply(reply))
}

/// `GET /{provider}/v1/models/{model}`
pub async fn get_model(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((provider, model)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let ctx = request_context(&caller, provider);
    let reply = state
        .orchestrator
        .get_model(&ctx, &model)
        .await
        .map_err(|e| ApiError::new(e, caller.request_id.clone()))?;
    Ok(json_reply(reply))
}
