//! Hugging Face client implementation

use super::converter::{completion_id, from_huggingface_response, to_huggingface_request};
use super::streaming::HuggingFaceGrammar;
use super::types::GeneratedText;
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

/// Hugging Face inference provider
pub struct HuggingFaceProvider {
    settings: ProviderSettings,
    http: HttpClient,
}

impl HuggingFaceProvider {
    pub fn new(settings: ProviderSettings, http: HttpClient) -> Self {
        Self { settings, http }
    }

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

    fn model_url(&self, model: &str) -> String {
        self.settings.endpoint(&format!("models/{}", model))
    }

    fn unsupported(&self, operation: &str) -> ProviderError {
        ProviderError::Unsupported {
            provider: self.settings.name.clone(),
            operation: operation.to_string(),
        }
    }
}

impl Sealed for HuggingFaceProvider {}

#[async_trait]
impl Provider for HuggingFaceProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        let mut body = to_huggingface_request(request);
        body.stream = false;

        let response = self
            .http
            .post_json(&self.model_url(&request.model), self.build_headers()?, &body)
            .await?;
        let generated: Vec<GeneratedText> = self.http.read_json(response).await?;

        debug!(provider = %self.settings.name, model = %request.model, "Hugging Face generation received");
        Ok(from_huggingface_response(
            generated,
            &request.model,
            chrono::Utc::now().timestamp(),
        ))
    }

    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream> {
        let mut body = to_huggingface_request(request);
        body.stream = true;

        let response = self
            .http
            .post_json_streaming(&self.model_url(&request.model), self.build_headers()?, &body)
            .await?;

        let decoder =
            StreamDecoder::new(HuggingFaceGrammar, &request.model).with_fallback_id(completion_id());
        Ok(ChatStream::new(response.bytes_stream(), decoder))
    }

    async fn list_models(&self) -> ProviderResult<Bytes> {
        Err(self.unsupported("list models"))
    }

    async fn get_model(&self, _model: &str) -> ProviderResult<Bytes> {
        Err(self.unsupported("get model"))
    }
}
