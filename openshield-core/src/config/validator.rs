//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::GatewayConfig;
use tracing::warn;

/// Configuration validator with rules that span several sections
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        // First run the built-in validation
        config.validate()?;

        self.validate_providers(config)?;
        self.validate_rules(config);

        Ok(())
    }

    fn validate_providers(&self, config: &GatewayConfig) -> Result<(), ValidationError> {
        if !config.providers.is_empty() && !config.providers.iter().any(|p| p.enabled) {
            return Err(ValidationError::incompatible(
                "providers",
                "at least one provider must be enabled",
            ));
        }
        Ok(())
    }

    /// Shared order numbers are legal; they are evaluated in declaration order
    fn validate_rules(&self, config: &GatewayConfig) {
        let mut enabled: Vec<_> = config.rules.input.iter().filter(|r| r.enabled).collect();
        enabled.sort_by_key(|r| r.order_number);
        for pair in enabled.windows(2) {
            if pair[0].order_number == pair[1].order_number {
                warn!(
                    first = %pair[0].name,
                    second = %pair[1].name,
                    order_number = pair[0].order_number,
                    "Rules share an order number; declaration order decides"
                );
            }
        }
    }
}
