//! Request-level errors and their client-facing shape

use crate::providers::ProviderError;
use crate::rules::RuleError;
use serde::Serialize;
use thiserror::Error;

/// Every way a gateway request can end without a normal answer
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or incomplete client request
    #[error("{message}")]
    InvalidRequest {
        message: String,
        param: Option<&'static str>,
        code: &'static str,
    },

    #[error("Unauthorized")]
    Unauthorized,

    /// Too many requests from one client address
    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider '{0}' is not configured")]
    ProviderNotFound(String),

    /// Blocked by an input rule; the message is the rule status JSON
    #[error("{0}")]
    RuleBlocked(String),

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error("rule evaluation failed: {0}")]
    RuleService(#[from] RuleError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification used for the `type` field of the error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Upstream,
    RuleService,
    Internal,
}

impl GatewayError {
    pub fn invalid_request(message: impl Into<String>, param: Option<&'static str>) -> Self {
        GatewayError::InvalidRequest {
            message: message.into(),
            param,
            code: "invalid_request",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::InvalidRequest { .. }
            | GatewayError::Unauthorized
            | GatewayError::RateLimited { .. }
            | GatewayError::ProviderNotFound(_)
            | GatewayError::RuleBlocked(_) => ErrorClass::Client,
            GatewayError::Upstream(ProviderError::ModelNotFound(_))
            | GatewayError::Upstream(ProviderError::Unsupported { .. }) => ErrorClass::Client,
            GatewayError::Upstream(_) => ErrorClass::Upstream,
            GatewayError::RuleService(RuleError::NoUserMessage) => ErrorClass::Client,
            GatewayError::RuleService(_) => ErrorClass::RuleService,
            GatewayError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest { .. } | GatewayError::RuleBlocked(_) => 400,
            GatewayError::Unauthorized => 401,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::ProviderNotFound(_) => 404,
            GatewayError::Upstream(ProviderError::ModelNotFound(_))
            | GatewayError::Upstream(ProviderError::Unsupported { .. }) => 404,
            GatewayError::RuleService(RuleError::NoUserMessage) => 400,
            GatewayError::Upstream(_) | GatewayError::RuleService(_) | GatewayError::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest { code, .. } => *code,
            GatewayError::Unauthorized => "invalid_header",
            GatewayError::RateLimited { .. } => "rate_limit_exceeded",
            GatewayError::ProviderNotFound(_) => "provider_not_found",
            GatewayError::RuleBlocked(_) => "rule_blocked",
            GatewayError::Upstream(ProviderError::ModelNotFound(_))
            | GatewayError::Upstream(ProviderError::Unsupported { .. }) => "model_not_found",
            GatewayError::Upstream(ProviderError::Timeout(_)) => "upstream_timeout",
            GatewayError::Upstream(_) => "upstream_error",
            GatewayError::RuleService(RuleError::NoUserMessage) => "invalid_request",
            GatewayError::RuleService(_) => "rule_service_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    pub fn param(&self) -> Option<&'static str> {
        match self {
            GatewayError::InvalidRequest { param, .. } => *param,
            GatewayError::Unauthorized => Some("Authorization"),
            GatewayError::ProviderNotFound(_) => Some("provider"),
            GatewayError::Upstream(ProviderError::ModelNotFound(_)) => Some("model"),
            GatewayError::RuleService(RuleError::NoUserMessage) => Some("messages"),
            _ => None,
        }
    }

    /// Client-facing body; server-side failures carry the request id
    pub fn body(&self, request_id: Option<&str>) -> ErrorBody {
        let error_type = match self.class() {
            ErrorClass::Client => "invalid_request_error",
            ErrorClass::Upstream => "upstream_error",
            ErrorClass::RuleService | ErrorClass::Internal => "server_error",
        };

        let mut message = self.to_string();
        if let (Some(id), true) = (request_id, self.status() >= 500) {
            message = format!("{} [request_id: {}]", message, id);
        }

        ErrorBody {
            error: ErrorDetail {
                message,
                error_type,
                param: self.param(),
                code: self.code(),
            },
        }
    }
}

impl From<crate::protocol::RequestError> for GatewayError {
    fn from(err: crate::protocol::RequestError) -> Self {
        let param = Some(err.param());
        GatewayError::invalid_request(err.to_string(), param)
    }
}

/// `{"error": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub param: Option<&'static str>,
    pub code: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(GatewayError::Unauthorized, 401, "invalid_header" ; "unauthorized")]
    #[test_case(GatewayError::RateLimited { retry_after_secs: 3 }, 429, "rate_limit_exceeded" ; "rate limited")]
    #[test_case(GatewayError::ProviderNotFound("x".into()), 404, "provider_not_found" ; "unknown provider")]
    #[test_case(GatewayError::RuleBlocked("{}".into()), 400, "rule_blocked" ; "blocked")]
    #[test_case(GatewayError::Upstream(ProviderError::ModelNotFound("m".into())), 404, "model_not_found" ; "missing model")]
    #[test_case(GatewayError::Upstream(ProviderError::Upstream { status: 502, message: "bad".into() }), 500, "upstream_error" ; "upstream")]
    #[test_case(GatewayError::RuleService(RuleError::Transport("down".into())), 500, "rule_service_error" ; "rule service")]
    fn test_status_and_code(err: GatewayError, status: u16, code: &str) {
        assert_eq!(err.status(), status);
        assert_eq!(err.code(), code);
    }

    #[test]
    fn test_unauthorized_body() {
        let body = serde_json::to_value(GatewayError::Unauthorized.body(Some("req-1"))).unwrap();
        assert_eq!(
            body,
            json!({"error": {
                "message": "Unauthorized",
                "type": "invalid_request_error",
                "param": "Authorization",
                "code": "invalid_header"
            }})
        );
    }

    #[test]
    fn test_server_errors_carry_request_id() {
        let err = GatewayError::Internal("boom".into());
        let body = err.body(Some("req-7"));
        assert_eq!(body.error.message, "internal error: boom [request_id: req-7]");
        assert_eq!(body.error.error_type, "server_error");
    }

    #[test]
    fn test_request_error_conversion() {
        let err = GatewayError::from(crate::protocol::RequestError::MissingModel);
        assert_eq!(err.status(), 400);
        assert_eq!(err.param(), Some("model"));
    }
}
