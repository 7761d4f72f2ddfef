//! Rule and plugin configuration
//!
//! `config` is sent verbatim to the rule execution service, so its serialized
//! form is the service's wire shape: a flat object tagged by `plugin_name`.

use super::error::ValidationError;
use super::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One configured policy rule
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub rule_type: RuleType,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Evaluation rank; lower runs first, ties keep declaration order
    #[serde(default)]
    pub order_number: u32,

    pub action: RuleAction,

    pub config: PluginConfig,
}

/// Rule categories with their own decision policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    LanguageDetection,
    PromptInjection,
    Moderation,
    InvisibleChars,
    PiiFilter,
    LlamaGuard,
    PromptGuard,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::LanguageDetection => "language_detection",
            RuleType::PromptInjection => "prompt_injection",
            RuleType::Moderation => "moderation",
            RuleType::InvisibleChars => "invisible_chars",
            RuleType::PiiFilter => "pii_filter",
            RuleType::LlamaGuard => "llama_guard",
            RuleType::PromptGuard => "prompt_guard",
        }
    }

    /// Whether `plugin` can serve this rule type
    pub fn accepts(&self, plugin: &Plugin) -> bool {
        matches!(
            (self, plugin),
            (RuleType::LanguageDetection, Plugin::DetectEnglish)
                | (RuleType::PromptInjection, Plugin::PromptInjectionLlm)
                | (RuleType::PromptInjection, Plugin::PromptGuard)
                | (RuleType::Moderation, Plugin::OpenaiModeration { .. })
                | (RuleType::InvisibleChars, Plugin::InvisibleChars)
                | (RuleType::PiiFilter, Plugin::Pii { .. })
                | (RuleType::LlamaGuard, Plugin::LlamaGuard { .. })
                | (RuleType::PromptGuard, Plugin::PromptGuard)
        )
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a match does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Block,
    Monitor,
}

/// Plugin selection plus the scoring knobs shared by every plugin
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PluginConfig {
    #[serde(flatten)]
    pub plugin: Plugin,

    /// Score cut-off in `0..=1`
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// How the score is compared to the threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
}

impl PluginConfig {
    pub fn new(plugin: Plugin) -> Self {
        Self {
            plugin,
            threshold: default_threshold(),
            relation: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ValidationError::out_of_range(
                format!("{}.threshold", path),
                "Must be between 0.0 and 1.0",
            ));
        }

        match &self.plugin {
            Plugin::OpenaiModeration { api_key } if api_key.is_empty() => {
                Err(ValidationError::required(format!("{}.api_key", path)))
            }
            Plugin::Pii { method: Some(method), .. }
                if !matches!(method.as_str(), "replace" | "redact" | "mask" | "hash") =>
            {
                Err(ValidationError::invalid_value(
                    format!("{}.method", path),
                    "replace, redact, mask or hash",
                    method,
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Plugins known to the rule execution service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "plugin_name", rename_all = "snake_case")]
pub enum Plugin {
    DetectEnglish,
    PromptInjectionLlm,
    InvisibleChars,
    OpenaiModeration {
        api_key: SecretString,
    },
    Pii {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        entities: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
    },
    LlamaGuard {
        /// Category codes (`S1`..) that count as violations; empty means all
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        categories: Vec<String>,
    },
    PromptGuard,
}

/// Score comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Relation {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

impl RuleConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::required(format!("{}.name", path)));
        }

        if !self.rule_type.accepts(&self.config.plugin) {
            return Err(ValidationError::incompatible(
                format!("{}.config.plugin_name", path),
                format!("plugin is not usable for rule type '{}'", self.rule_type),
            ));
        }

        self.config.validate(&format!("{}.config", path))
    }
}
