//! Translation of gateway failures into HTTP responses

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use openshield_core::orchestrator::ErrorClass;
use openshield_core::GatewayError;
use tracing::{error, warn};

/// A [`GatewayError`] bound to the request it failed
#[derive(Debug)]
pub struct ApiError {
    pub error: GatewayError,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<GatewayError>, request_id: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            request_id: Some(request_id.into()),
        }
    }

    pub fn unauthorized(request_id: impl Into<String>) -> Self {
        Self::new(GatewayError::Unauthorized, request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let request_id = self.request_id.as_deref();

        match self.error.class() {
            ErrorClass::Client => {
                warn!(request_id = request_id.unwrap_or("-"), code = self.error.code(), error = %self.error, "Client error")
            }
            _ => {
                error!(request_id = request_id.unwrap_or("-"), code = self.error.code(), error = %self.error, "Request failed")
            }
        }

        let mut response = (status, Json(self.error.body(request_id))).into_response();
        if let GatewayError::RateLimited { retry_after_secs } = self.error {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_body() {
        let response = ApiError::unauthorized("req-1").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_of(response).await;
        assert_eq!(body["error"]["message"], "Unauthorized");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["param"], "Authorization");
        assert_eq!(body["error"]["code"], "invalid_header");
    }

    #[tokio::test]
    async fn test_server_errors_carry_request_id() {
        let response =
            ApiError::new(GatewayError::Internal("boom".into()), "req-42").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_of(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .ends_with("[request_id: req-42]"));
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let err = GatewayError::RateLimited { retry_after_secs: 7 };
        let response = ApiError::new(err, "req-9").into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "7");

        let body = json_of(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");
    }
}
