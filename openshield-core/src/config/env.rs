//! Environment variable interpolation for configuration

use super::error::ConfigError;
use regex::Regex;
use std::env;

/// `${NAME}` placeholders; lower-case names are left alone
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Interpolate environment variables in a configuration string
///
/// Every placeholder must resolve; the first missing variable is reported.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;

    let mut result = String::with_capacity(content.len());
    let mut last = 0;
    for cap in pattern.captures_iter(content) {
        let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let value = env::var(name.as_str()).map_err(|_| ConfigError::EnvVarNotFound {
            var: name.as_str().to_string(),
        })?;
        result.push_str(&content[last..full.start()]);
        result.push_str(&value);
        last = full.end();
    }
    result.push_str(&content[last..]);

    Ok(result)
}
