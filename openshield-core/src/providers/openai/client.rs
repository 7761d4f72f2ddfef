//! OpenAI client implementation

use super::converter::{from_openai_response, to_openai_request};
use super::streaming::OpenAIGrammar;
use super::types::OpenAIResponse;
use crate::http::HttpClient;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse};
use crate::providers::adapter::sealed::Sealed;
use crate::providers::{
    ChatStream, Provider, ProviderError, ProviderKind, ProviderResult, ProviderSettings,
    StreamDecoder,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

/// OpenAI provider implementation
pub struct OpenAIProvider {
    settings: ProviderSettings,
    http: HttpClient,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new(settings: ProviderSettings, http: HttpClient) -> Self {
        Self { settings, http }
    }

    /// Build request headers
    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!(
            "Bearer {}",
            self.settings.api_key.expose_secret()
        ))
        .map_err(|_| ProviderError::Configuration("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

impl Sealed for OpenAIProvider {}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        let mut openai_request = to_openai_request(request);
        openai_request.stream = None;
        openai_request.stream_options = None;

        let url = self.settings.endpoint("chat/completions");
        let response = self
            .http
            .post_json(&url, self.build_headers()?, &openai_request)
            .await?;
        let openai_response: OpenAIResponse = self.http.read_json(response).await?;

        debug!(provider = %self.settings.name, id = %openai_response.id, "OpenAI completion received");
        Ok(from_openai_response(openai_response))
    }

    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        let openai_request = to_openai_request(&request.clone().with_streaming(true));

        let url = self.settings.endpoint("chat/completions");
        let response = self
            .http
            .post_json_streaming(&url, self.build_headers()?, &openai_request)
            .await?;

        let decoder = StreamDecoder::new(OpenAIGrammar, &request.model);
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
