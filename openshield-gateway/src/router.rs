//! Route configuration

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{auth_middleware, rate_limit_middleware, request_id_middleware};
use crate::state::AppState;

/// Upper bound on request bodies
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Create the application router
///
/// ## Routes
/// - GET /health - Liveness, no authentication
/// - POST /{provider}/v1/chat/completions - Chat completion, JSON or SSE
/// - GET /{provider}/v1/models - Proxied model listing
/// - GET /{provider}/v1/models/{model} - Proxied model lookup
///
/// Provider routes are rate limited per client address, then require a bearer
/// API key. Every response carries `x-request-id`.
pub fn create_router(state: AppState) -> Router {
    let provider_routes = Router::new()
        .route("/:provider/v1/chat/completions", post(handlers::chat_completions))
        .route("/:provider/v1/models", get(handlers::list_models))
        .route("/:provider/v1/models/:model", get(handlers::get_model))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(provider_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
