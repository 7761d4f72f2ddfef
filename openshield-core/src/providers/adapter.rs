//! Provider adapter trait and the name-keyed registry
//!
//! The set of vendors is closed: `Provider` is sealed and every implementation
//! lives in this crate. Adapters are constructed once per configuration snapshot
//! through [`ProviderKind::create_provider`] and looked up by their configured
//! name.

use crate::config::{ProviderConfig, SecretString};
use crate::http::HttpClient;
use crate::protocol::{ChatCompletionRequest, ChatCompletionResponse};
use crate::providers::{ChatStream, ProviderResult};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Core provider trait implemented by every vendor adapter
#[async_trait]
pub trait Provider: sealed::Sealed + Send + Sync {
    /// Configured name, also the first path segment of the public routes
    fn name(&self) -> &str;

    /// Vendor this adapter speaks to
    fn kind(&self) -> ProviderKind;

    /// One synchronous upstream call
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse>;

    /// Open an upstream stream
    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatStream>;

    /// Raw model listing, returned verbatim to the client
    async fn list_models(&self) -> ProviderResult<Bytes>;

    /// Raw description of one model
    async fn get_model(&self, model: &str) -> ProviderResult<Bytes>;
}

/// Supported vendor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
    HuggingFace,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    /// Create a provider instance for this kind
    pub fn create_provider(&self, settings: ProviderSettings, http: HttpClient) -> Arc<dyn Provider> {
        match self {
            ProviderKind::OpenAI => Arc::new(crate::providers::OpenAIProvider::new(settings, http)),
            ProviderKind::Anthropic => {
                Arc::new(crate::providers::AnthropicProvider::new(settings, http))
            }
            ProviderKind::HuggingFace => {
                Arc::new(crate::providers::HuggingFaceProvider::new(settings, http))
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings of one adapter
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub name: String,
    pub api_key: SecretString,
    pub base_url: String,
}

impl ProviderSettings {
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<SecretString>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Join the base URL and an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl From<&ProviderConfig> for ProviderSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self::new(&config.name, config.api_key.clone(), &config.base_url)
    }
}

/// Adapters keyed by configured provider name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every enabled provider in the configuration
    pub fn from_config(providers: &[ProviderConfig], http: &HttpClient) -> Self {
        let mut registry = Self::new();
        for config in providers.iter().filter(|p| p.enabled) {
            debug!(
                provider = %config.name,
                kind = %config.kind,
                key = %config.api_key.hint(),
                "Registering provider"
            );
            registry.register(
                config
                    .kind
                    .create_provider(ProviderSettings::from(config), http.clone()),
            );
        }
        registry
    }

    /// Add or replace an adapter under its own name
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(name: &str, kind: ProviderKind, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            kind,
            api_key: SecretString::new("sk-test"),
            base_url: "https://api.example.com/v1/".to_string(),
            enabled,
        }
    }

    #[test]
    fn test_settings_endpoint_join() {
        let settings = ProviderSettings::new("openai", "k", "https://api.openai.com/v1/");
        assert_eq!(
            settings.endpoint("/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_registry_skips_disabled_providers() {
        let http = HttpClient::new().unwrap();
        let registry = ProviderRegistry::from_config(
            &[
                provider_config("openai", ProviderKind::OpenAI, true),
                provider_config("claude", ProviderKind::Anthropic, true),
                provider_config("hf", ProviderKind::HuggingFace, false),
            ],
            &http,
        );

        assert_eq!(registry.names(), vec!["claude", "openai"]);
        assert_eq!(registry.get("claude").unwrap().kind(), ProviderKind::Anthropic);
        assert!(registry.get("hf").is_none());
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: ProviderKind = serde_yaml::from_str("huggingface").unwrap();
        assert_eq!(kind, ProviderKind::HuggingFace);
        assert_eq!(ProviderKind::OpenAI.to_string(), "openai");
    }
}
