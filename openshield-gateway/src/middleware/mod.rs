//! Request middleware
//!
//! Every route gets a request id; provider routes are rate limited per client
//! address and require a bearer API key that resolves to an active product.

mod auth;
mod rate_limit;
mod request_id;

pub use auth::{auth_middleware, client_ip, Caller};
pub use rate_limit::{build_limiter, rate_limit_middleware, KeyedLimiter};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
