//! Anthropic client implementation

use super::converter::{from_anthropic_response, to_anthropic_request};
use super::streaming::AnthropicGrammar;
use super::types::{AnthropicResponse, ANTHROPIC_VERSION};
use crate::http::HttpClient;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse};
use crate::providers::adapter::sealed::Sealed;
use crate::providers::{
    ChatStream, Provider, ProviderError, ProviderKind, ProviderResult, ProviderSettings,
    StreamDecoder,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

/// Anthropic provider implementation
pub struct AnthropicProvider {
    settings: ProviderSettings,
    http: HttpClient,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings, http: HttpClient) -> Self {
        Self { settings, http }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(self.settings.api_key.expose_secret())
            .map_err(|_| ProviderError::Configuration("API key is not a valid header value".into()))?;
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(headers)
    }
}

impl Sealed for AnthropicProvider {}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        let mut body = to_anthropic_request(request);
        body.stream = false;

        let response = self
            .http
            .post_json(&self.settings.endpoint("messages"), self.build_headers()?, &body)
            .await?;
        let anthropic_response: AnthropicResponse = self.http.read_json(response).await?;

        debug!(provider = %self.settings.name, id = %anthropic_response.id, "Anthropic message received");
        Ok(from_anthropic_response(
            anthropic_response,
            chrono::Utc::now().timestamp(),
        ))
    }

    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        let mut body = to_anthropic_request(request);
        body.stream = true;

        let response = self
            .http
            .post_json_streaming(&self.settings.endpoint("messages"), self.build_headers()?, &body)
            .await?;

        let decoder = StreamDecoder::new(AnthropicGrammar, &request.model);
        Ok(ChatStream::new(response.bytes_stream(), decoder))
    }

    async fn list_models(&self) -> ProviderResult<Bytes> {
        let response = self
            .http
            .get(&self.settings.endpoint("models"), self.build_headers()?)
            .await?;
        self.http.read_body(response).await
    }

    async fn get_model(&self, model: &str) -> ProviderResult<Bytes> {
        let response = self
            .http
            .get(
                &self.settings.endpoint(&format!("models/{}", model)),
                self.build_headers()?,
            )
            .await?;
        self.http.read_body(response).await
    }
}
