//! Per client address request limit on provider routes

use super::auth::client_ip;
use super::request_id::RequestId;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use openshield_core::config::RateLimitConfig;
use openshield_core::GatewayError;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// GCRA limiter keyed by client address
pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Limiter for `config`, `None` when rate limiting is off
///
/// `max` requests may arrive at once; capacity then refills one request every
/// `window / max`.
pub fn build_limiter(config: &RateLimitConfig) -> Option<KeyedLimiter> {
    if !config.enabled {
        return None;
    }
    let max = NonZeroU32::new(config.max)?;
    let period = Duration::from_secs(config.window) / max.get();
    let quota = Quota::with_period(period)?.allow_burst(max);
    Some(RateLimiter::keyed(quota))
}

/// Reject with 429 once the caller's address has used up its quota
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_deref() else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    if let Err(not_until) = limiter.check_key(&ip) {
        let wait = not_until.wait_time_from(DefaultClock::default().now());
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        debug!(request_id = %request_id, ip = %ip, wait_ms = wait.as_millis() as u64, "Rate limited");

        let err = GatewayError::RateLimited {
            retry_after_secs: whole_seconds(wait),
        };
        return ApiError::new(err, request_id).into_response();
    }

    next.run(request).await
}

/// Rounded up, never below one second
fn whole_seconds(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
