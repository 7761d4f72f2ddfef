use axum::Json;
use serde_json::{json, Value};

/// `GET /health`, unauthenticated
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": openshield_core::version(),
    }))
}
