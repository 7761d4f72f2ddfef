//! HTTP client module for calls leaving the gateway
//!
//! Provider adapters, the rule-service client and the remote context cache all
//! share one pooled `reqwest` client. This module owns:
//! - Connection pooling and timeouts taken from `settings.connection`
//! - Mapping of non-2xx upstream responses onto `ProviderError`
//! - The response size guard

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::map_http_error;
