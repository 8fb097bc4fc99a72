//! @ai:module:intent Uniform failure taxonomy for provider calls
//! @ai:module:layer domain
//! @ai:module:public_api ErrorKind, ClassifiedError, ErrorDetails, Result
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// @ai:intent The five failure kinds a caller can ever observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RateLimit,
    #[serde(rename = "AUTH_ERROR")]
    Auth,
    #[serde(rename = "NETWORK_ERROR")]
    Network,
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "GENERIC_ERROR")]
    Generic,
}

impl ErrorKind {
    /// @ai:intent Wire name of the kind
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Generic => "GENERIC_ERROR",
        }
    }

    /// @ai:intent Whether the executor may spend retry budget on this kind
    /// @ai:effects pure
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::Validation | ErrorKind::Auth)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// @ai:intent Kind-specific context attached to a failure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDetails {
    /// HTTP status of the failed response, when there was one
    pub status: Option<u16>,
    /// Server-supplied retry hint (429 only)
    pub retry_after: Option<Duration>,
    /// Required input fields that were absent (validation only)
    pub missing_fields: Vec<String>,
    /// Parsed response body, JSON when possible, otherwise the raw text
    pub body: Option<serde_json::Value>,
    /// Capability name for unsupported-operation failures
    pub operation: Option<String>,
}

/// @ai:intent Failure normalized into the taxonomy, hiding transport detail
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} [{provider}]: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub provider: String,
    pub details: ErrorDetails,
}

pub type Result<T> = std::result::Result<T, ClassifiedError>;

impl ClassifiedError {
    /// @ai:intent Build a failure with empty details
    /// @ai:effects pure
    pub fn new(kind: ErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
            details: ErrorDetails::default(),
        }
    }

    /// @ai:intent Validation failure listing the absent fields
    /// @ai:effects pure
    pub fn missing_fields(provider: impl Into<String>, fields: Vec<String>) -> Self {
        let message = format!("missing required fields: {}", fields.join(", "));
        let mut err = Self::new(ErrorKind::Validation, provider, message);
        err.details.missing_fields = fields;
        err
    }

    /// @ai:intent Capability not offered by the selected provider
    /// @ai:effects pure
    pub fn unsupported(provider: impl Into<String>, operation: &str) -> Self {
        let mut err = Self::new(
            ErrorKind::Generic,
            provider,
            format!("unsupported operation: {operation}"),
        );
        err.details.operation = Some(operation.to_string());
        err
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.details.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.details.retry_after = retry_after;
        self
    }

    pub fn with_body(mut self, body: Option<serde_json::Value>) -> Self {
        self.details.body = body;
        self
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == ErrorKind::RateLimit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_uses_wire_name() {
        let err = ClassifiedError::new(ErrorKind::Auth, "openai", "invalid api key");
        assert_eq!(err.to_string(), "AUTH_ERROR [openai]: invalid api key");
    }

    #[test]
    fn test_only_validation_and_auth_are_terminal() {
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Generic.is_retryable());
    }

    #[test]
    fn test_missing_fields_carries_field_list() {
        let err = ClassifiedError::missing_fields("stability", vec!["prompt".into(), "image".into()]);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.details.missing_fields, vec!["prompt".to_string(), "image".to_string()]);
        assert!(err.message.contains("prompt, image"));
    }

    #[test]
    fn test_unsupported_is_generic() {
        let err = ClassifiedError::unsupported("elevenlabs", "generate_image");
        assert_eq!(err.kind, ErrorKind::Generic);
        assert_eq!(err.details.operation.as_deref(), Some("generate_image"));
    }

    #[test]
    fn test_kind_serializes_to_wire_name() {
        let json = serde_json::to_string(&ErrorKind::RateLimit).unwrap();
        assert_eq!(json, "\"RATE_LIMIT\"");
        let json = serde_json::to_string(&ErrorKind::Network).unwrap();
        assert_eq!(json, "\"NETWORK_ERROR\"");
    }
}
