use super::request_id::RequestId;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use openshield_core::GatewayError;
use std::net::SocketAddr;
use tracing::{debug, error};
use uuid::Uuid;

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub request_id: String,
    pub api_key_id: Uuid,
    pub product_id: Uuid,
    pub ip_address: String,
}

/// Resolve `Authorization: Bearer <key>` against the api key directory
///
/// Missing, malformed, unknown and inactive keys all get the same 401. A
/// directory outage is a 500.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let Some(key) = bearer_token(request.headers()) else {
        debug!(request_id = %request_id, "Missing bearer token");
        return ApiError::unauthorized(request_id).into_response();
    };

    let record = match state.api_keys.lookup(key).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(request_id = %request_id, "Unknown or inactive api key");
            return ApiError::unauthorized(request_id).into_response();
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Api key lookup failed");
            let err = GatewayError::Internal(format!("api key lookup failed: {}", e));
            return ApiError::new(err, request_id).into_response();
        }
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let caller = Caller {
        ip_address: client_ip(request.headers(), peer),
        request_id,
        api_key_id: record.api_key_id,
        product_id: record.product_id,
    };
    request.extensions_mut().insert(caller);

    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use test_case::test_case;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test_case(&[("authorization", "Bearer sk-123")], Some("sk-123") ; "bearer")]
    #[test_case(&[("authorization", "bearer  sk-123 ")], Some("sk-123") ; "lowercase scheme")]
    #[test_case(&[("authorization", "Basic abc")], None ; "wrong scheme")]
    #[test_case(&[("authorization", "Bearer ")], None ; "empty token")]
    #[test_case(&[], None ; "missing")]
    fn test_bearer_token(pairs: &[(&'static str, &'static str)], expected: Option<&str>) {
        assert_eq!(bearer_token(&headers(pairs)), expected);
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        let forwarded = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&forwarded, Some(peer)), "203.0.113.7");

        let real_ip = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&real_ip, Some(peer)), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }
}
