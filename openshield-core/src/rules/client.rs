//! Rule execution service client

use super::types::{RulePrompt, RuleRequest, RuleResult};
use super::RuleError;
use crate::config::{PluginConfig, RuleServerConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Runs one plugin against one prompt
#[async_trait]
pub trait RuleExecutor: Send + Sync {
    async fn execute(&self, prompt: &RulePrompt, config: &PluginConfig) -> Result<RuleResult, RuleError>;
}

/// Executor backed by `POST {url}/rule/execute`
#[derive(Debug, Clone)]
pub struct HttpRuleExecutor {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRuleExecutor {
    pub fn new(client: reqwest::Client, config: &RuleServerConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/rule/execute", config.url.trim_end_matches('/')),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RuleExecutor for HttpRuleExecutor {
    async fn execute(&self, prompt: &RulePrompt, config: &PluginConfig) -> Result<RuleResult, RuleError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&RuleRequest { prompt, config })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuleError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let result: RuleResult =
            serde_json::from_slice(&body).map_err(|e| RuleError::Decode(e.to_string()))?;
        debug!(matched = result.matched, score = result.inspection.score, "Rule service answered");
        Ok(result)
    }
}
