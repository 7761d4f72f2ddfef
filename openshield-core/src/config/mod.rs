//! Gateway configuration
//!
//! The configuration is a YAML file with `${VAR}` placeholders resolved from the
//! environment before parsing. Every load, including hot reloads, goes through
//! the same parse and validate pipeline.

mod env;
mod error;
mod rules;
mod schema;
mod secrets;
mod validator;
mod watcher;

pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use rules::{Plugin, PluginConfig, Relation, RuleAction, RuleConfig, RuleType};
pub use schema::{
    CacheConfig, ConnectionConfig, ContextCacheConfig, DatabaseConfig, FeatureToggle,
    GatewayConfig, NetworkConfig, ProviderConfig, RateLimitConfig, RedisConfig, RuleServerConfig,
    RulesConfig, Settings,
};
pub use secrets::SecretString;
pub use validator::ConfigValidator;
pub use watcher::{watch_file, ConfigWatcher};

use std::fs;
use std::path::Path;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

    load_from_str(&content, &path.to_string_lossy())
}

/// Parse and validate configuration text; `origin` names it in errors
pub fn load_from_str(content: &str, origin: &str) -> ConfigResult<GatewayConfig> {
    // Interpolate environment variables before parsing
    let interpolated = env::interpolate_env_vars(content)?;

    let config: GatewayConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::yaml(origin, e))?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}
