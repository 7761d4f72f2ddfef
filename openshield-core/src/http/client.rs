//! HTTP client implementation using reqwest

use crate::config::ConnectionConfig;
use crate::http::error::map_http_error;
use crate::providers::{ProviderError, ProviderResult};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum response size (10MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("openshield/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
///
/// The pooled client carries no overall timeout because streamed bodies can
/// legitimately stay open for minutes. Synchronous calls get `request_timeout`
/// per request instead.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    request_timeout: Duration,
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> ProviderResult<Self> {
        Self::from_config(&ConnectionConfig::default())
    }

    /// Create a client from the `settings.connection` section
    pub fn from_config(config: &ConnectionConfig) -> ProviderResult<Self> {
        Self::with_config(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
            config.max_idle_per_host,
        )
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> ProviderResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            request_timeout,
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Per-request timeout applied to synchronous calls
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Underlying pooled client, shared with the rule and context services
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// POST a JSON body and wait for a complete response
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> ProviderResult<Response> {
        let builder = self
            .client
            .post(url)
            .headers(headers)
            .timeout(self.request_timeout)
            .json(body);
        self.send(url, builder).await
    }

    /// POST a JSON body whose response is consumed incrementally
    pub async fn post_json_streaming<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> ProviderResult<Response> {
        let builder = self
            .client
            .post(url)
            .headers(headers)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body);
        self.send(url, builder).await
    }

    /// GET with the synchronous timeout
    pub async fn get(&self, url: &str, headers: HeaderMap) -> ProviderResult<Response> {
        let builder = self
            .client
            .get(url)
            .headers(headers)
            .timeout(self.request_timeout);
        self.send(url, builder).await
    }

    /// Send a request and turn any non-2xx status into a `ProviderError`
    async fn send(&self, url: &str, builder: RequestBuilder) -> ProviderResult<Response> {
        debug!("Sending upstream request to {}", url);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Upstream request to {} timed out", url);
            } else {
                warn!("Upstream request to {} failed: {}", url, e);
            }
            ProviderError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(
                status = status.as_u16(),
                body = body.as_deref().unwrap_or(""),
                "Upstream request to {} failed",
                url
            );
            return Err(map_http_error(status, body));
        }

        Ok(response)
    }

    /// Read a complete body, enforcing the size limit
    pub async fn read_body(&self, response: Response) -> ProviderResult<Bytes> {
        if let Some(length) = response.content_length() {
            if length as usize > self.max_response_size {
                return Err(ProviderError::ResponseTooLarge {
                    size: length as usize,
                    max: self.max_response_size,
                });
            }
        }

        let body = response.bytes().await?;
        if body.len() > self.max_response_size {
            return Err(ProviderError::ResponseTooLarge {
                size: body.len(),
                max: self.max_response_size,
            });
        }
        Ok(body)
    }

    /// Read a complete body and decode it as JSON
    pub async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> ProviderResult<T> {
        let body = self.read_body(response).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
