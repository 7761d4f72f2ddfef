//! Configuration errors
//!
//! Every failure names where it happened: the file for I/O and YAML errors,
//! the dotted field path (`rules.input[2].config.threshold`) for validation.

use std::path::Path;
use thiserror::Error;

/// Why a configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in '{path}' at {}:{}: {message}",
            .line.unwrap_or(0), .column.unwrap_or(0))]
    ParseError {
        path: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("environment variable '{var}' is not set")]
    EnvVarNotFound { var: String },

    #[error("cannot watch '{path}': {message}")]
    Watch { path: String, message: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::IoError {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn yaml(origin: &str, err: serde_yaml::Error) -> Self {
        let location = err.location();
        ConfigError::ParseError {
            path: origin.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
            message: err.to_string(),
        }
    }

    /// Field path of a validation failure
    pub fn field_path(&self) -> Option<&str> {
        match self {
            ConfigError::ValidationError(err) => Some(&err.field_path),
            _ => None,
        }
    }
}

/// A field that parsed but does not make sense
#[derive(Debug, Error)]
#[error("invalid configuration at '{field_path}': {kind}")]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("value is required")]
    Missing,

    #[error("expected {expected}, got '{actual}'")]
    NotAllowed { expected: String, actual: String },

    #[error("{message}")]
    OutOfRange { message: String },

    #[error("'{value}' is declared more than once")]
    Duplicate { value: String },

    #[error("{message}")]
    Incompatible { message: String },

    #[error("invalid URL: {message}")]
    InvalidUrl { message: String },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
        }
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Missing)
    }

    pub fn invalid_value(
        field_path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::NotAllowed {
                expected: expected.into(),
                actual: actual.into(),
            },
        )
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::OutOfRange {
                message: message.into(),
            },
        )
    }

    pub fn duplicate(field_path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::Duplicate {
                value: value.into(),
            },
        )
    }

    pub fn incompatible(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::Incompatible {
                message: message.into(),
            },
        )
    }

    pub fn invalid_url(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::InvalidUrl {
                message: message.into(),
            },
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_the_field() {
        let err = ConfigError::from(ValidationError::out_of_range(
            "rules.input[0].config.threshold",
            "must be between 0.0 and 1.0",
        ));
        assert_eq!(err.field_path(), Some("rules.input[0].config.threshold"));
        assert_eq!(
            err.to_string(),
            "invalid configuration at 'rules.input[0].config.threshold': must be between 0.0 and 1.0"
        );
    }

    #[test]
    fn test_yaml_error_keeps_location() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("a: [").unwrap_err();
        match ConfigError::yaml("gateway.yaml", yaml_err) {
            ConfigError::ParseError { path, line, .. } => {
                assert_eq!(path, "gateway.yaml");
                assert!(line.is_some());
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
