//! Configuration schema structures with serde support

use super::error::ValidationError;
use super::rules::RuleConfig;
use super::secrets::SecretString;
use crate::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root configuration structure for the gateway
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Process-wide settings
    #[serde(default)]
    pub settings: Settings,

    /// Upstream LLM providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Policy rules
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Gateway settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub network: NetworkConfig,

    /// Flat response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversational context cache
    #[serde(default)]
    pub context_cache: ContextCacheConfig,

    /// KV backend; the in-process store is used when absent
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Relational store; the in-memory store is used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub audit_logging: FeatureToggle,

    #[serde(default)]
    pub usage_logging: FeatureToggle,

    #[serde(default)]
    pub rule_server: RuleServerConfig,

    /// Outbound HTTP connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Per client address limit on provider routes
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Entry lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,

    /// Key namespace in the KV backend
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: default_cache_ttl(),
            prefix: default_cache_prefix(),
        }
    }
}

/// Context cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextCacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Entry lifetime in seconds
    #[serde(default = "default_context_ttl")]
    pub ttl: u64,

    /// Remote context service; the KV backend is used when absent
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for ContextCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: default_context_ttl(),
            url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    pub uri: SecretString,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub uri: SecretString,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// On/off switch for optional subsystems
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FeatureToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Rule execution service
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleServerConfig {
    #[serde(default = "default_rule_server_url")]
    pub url: String,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_rule_timeout")]
    pub timeout_ms: u64,
}

impl Default for RuleServerConfig {
    fn default() -> Self {
        Self {
            url: default_rule_server_url(),
            timeout_ms: default_rule_timeout(),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds, not applied to streams
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

/// Request rate limit, keyed by client address
///
/// At most `max` requests per `window` seconds, refilled evenly across the window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_rate_limit_max")]
    pub max: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_window")]
    pub window: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max: default_rate_limit_max(),
            window: default_rate_limit_window(),
        }
    }
}

/// LLM Provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider name, used as the first path segment of the public routes
    pub name: String,

    /// Provider type (openai, anthropic, huggingface)
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Base URL for the provider API
    pub base_url: String,

    /// Whether this provider is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Rule sets by direction
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default)]
    pub input: Vec<RuleConfig>,
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_port() -> u16 { 8080 }
fn default_cache_ttl() -> u64 { 60 }
fn default_cache_prefix() -> String { "openshield".to_string() }
fn default_context_ttl() -> u64 { 3600 }
fn default_max_connections() -> u32 { 10 }
fn default_rule_server_url() -> String { "http://localhost:8000".to_string() }
fn default_rule_timeout() -> u64 { 10000 }
fn default_connect_timeout() -> u64 { 10000 }
fn default_request_timeout() -> u64 { 60000 }
fn default_max_idle() -> usize { 10 }
fn default_rate_limit_max() -> u32 { 50 }
fn default_rate_limit_window() -> u64 { 60 }

/// Check that `value` is an absolute http(s) URL
pub(crate) fn validate_http_url(path: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::required(path));
    }
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::invalid_url(
            path,
            format!("scheme must be http or https, got {}", url.scheme()),
        )),
        Err(e) => Err(ValidationError::invalid_url(path, e.to_string())),
    }
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.settings.validate("settings")?;

        let mut seen_names = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_names.insert(provider.name.as_str()) {
                return Err(ValidationError::duplicate(
                    format!("providers[{}].name", i),
                    &provider.name,
                ));
            }
            provider.validate(&format!("providers[{}]", i))?;
        }

        let mut seen_rules = HashSet::new();
        for (i, rule) in self.rules.input.iter().enumerate() {
            let path = format!("rules.input[{}]", i);
            if !seen_rules.insert(rule.name.as_str()) {
                return Err(ValidationError::duplicate(format!("{}.name", path), &rule.name));
            }
            rule.validate(&path)?;
        }

        Ok(())
    }
}

impl Settings {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.network.port == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.network.port", path),
                "Must be greater than 0",
            ));
        }

        if self.cache.enabled && self.cache.ttl == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.cache.ttl", path),
                "Must be greater than 0 when the cache is enabled",
            ));
        }
        if self.cache.prefix.is_empty() {
            return Err(ValidationError::required(format!("{}.cache.prefix", path)));
        }

        if self.context_cache.enabled && self.context_cache.ttl == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.context_cache.ttl", path),
                "Must be greater than 0 when the context cache is enabled",
            ));
        }
        if let Some(url) = &self.context_cache.url {
            validate_http_url(&format!("{}.context_cache.url", path), url)?;
        }

        if let Some(redis) = &self.redis {
            let uri_path = format!("{}.redis.uri", path);
            match url::Url::parse(redis.uri.expose_secret()) {
                Ok(url) if url.scheme() == "redis" || url.scheme() == "rediss" => {}
                Ok(url) => {
                    return Err(ValidationError::invalid_value(
                        uri_path,
                        "redis:// or rediss:// URI",
                        url.scheme(),
                    ))
                }
                Err(e) => return Err(ValidationError::invalid_url(uri_path, e.to_string())),
            }
        }

        if let Some(database) = &self.database {
            if database.uri.is_empty() {
                return Err(ValidationError::required(format!("{}.database.uri", path)));
            }
            if database.max_connections == 0 {
                return Err(ValidationError::out_of_range(
                    format!("{}.database.max_connections", path),
                    "Must be greater than 0",
                ));
            }
        }

        validate_http_url(&format!("{}.rule_server.url", path), &self.rule_server.url)?;
        if self.rule_server.timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.rule_server.timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.connection.request_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connection.request_timeout_ms", path),
                "Must be greater than 0",
            ));
        }

        if self.rate_limit.enabled {
            if self.rate_limit.max == 0 {
                return Err(ValidationError::out_of_range(
                    format!("{}.rate_limit.max", path),
                    "Must be greater than 0 when rate limiting is enabled",
                ));
            }
            if self.rate_limit.window == 0 {
                return Err(ValidationError::out_of_range(
                    format!("{}.rate_limit.window", path),
                    "Must be greater than 0 when rate limiting is enabled",
                ));
            }
        }

        Ok(())
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::required(format!("{}.name", path)));
        }

        // The name becomes a path segment
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::invalid_value(
                format!("{}.name", path),
                "letters, digits, '-' or '_'",
                &self.name,
            ));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        validate_http_url(&format!("{}.base_url", path), &self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = serde_yaml::from_str("providers: []").unwrap();
        assert_eq!(config.settings.network.port, 8080);
        assert!(!config.settings.cache.enabled);
        assert_eq!(config.settings.cache.ttl, 60);
        assert_eq!(config.settings.cache.prefix, "openshield");
        assert_eq!(config.settings.context_cache.ttl, 3600);
        assert!(config.settings.audit_logging.enabled);
        assert!(config.settings.usage_logging.enabled);
        assert_eq!(config.settings.rule_server.url, "http://localhost:8000");
        assert!(config.settings.rate_limit.enabled);
        assert_eq!(config.settings.rate_limit.max, 50);
        assert_eq!(config.settings.rate_limit.window, 60);
        assert!(config.rules.input.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<GatewayConfig, _> =
            serde_yaml::from_str("settings:\n  network:\n    port: 80\n    host: x\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_provider_validation() {
        let mut provider = ProviderConfig {
            name: "openai".into(),
            kind: ProviderKind::OpenAI,
            api_key: "sk-test".into(),
            base_url: "ftp://example.com".into(),
            enabled: true,
        };
        let err = provider.validate("providers[0]").unwrap_err();
        assert_eq!(err.field_path, "providers[0].base_url");

        provider.base_url = "https://api.openai.com/v1".into();
        provider.name = "open ai".into();
        assert!(provider.validate("providers[0]").is_err());
    }

    #[test]
    fn test_redis_uri_scheme() {
        let mut settings = Settings::default();
        settings.redis = Some(RedisConfig {
            uri: "http://localhost:6379".into(),
        });
        let err = settings.validate("settings").unwrap_err();
        assert_eq!(err.field_path, "settings.redis.uri");

        settings.redis = Some(RedisConfig {
            uri: "redis://localhost:6379/0".into(),
        });
        assert!(settings.validate("settings").is_ok());
    }

    #[test]
    fn test_rate_limit_bounds_only_checked_when_enabled() {
        let mut settings = Settings::default();
        settings.rate_limit.max = 0;
        let err = settings.validate("settings").unwrap_err();
        assert_eq!(err.field_path, "settings.rate_limit.max");

        settings.rate_limit.max = 5;
        settings.rate_limit.window = 0;
        let err = settings.validate("settings").unwrap_err();
        assert_eq!(err.field_path, "settings.rate_limit.window");

        settings.rate_limit.enabled = false;
        assert!(settings.validate("settings").is_ok());
    }
}
