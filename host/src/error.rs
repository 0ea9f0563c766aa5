//! Error type for native messaging responses.

use fieldlens_core::{ConfigError, ErrorCode, ErrorDebug, FieldLensError};
use serde::Serialize;
use thiserror::Error;

/// Serializable error sent back to the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct CommandError {
    /// Taxonomy code for panel handling (e.g., "NOT_LOGGED_IN")
    pub code: String,
    /// User-friendly error message
    pub message: String,
    /// Transport and candidate diagnostics, when the engine attached any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
}

impl CommandError {
    /// Create a command error without diagnostics.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            debug: None,
        }
    }
}

impl From<FieldLensError> for CommandError {
    fn from(err: FieldLensError) -> Self {
        Self {
            code: err.code.to_string(),
            message: err.message,
            debug: err.debug,
        }
    }
}

impl From<ConfigError> for CommandError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorCode::InternalError, format!("Configuration error: {err}"))
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorCode::InternalError, format!("I/O error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlens_core::Category;

    #[test]
    fn test_engine_error_conversion_keeps_debug() {
        let err = FieldLensError::new(ErrorCode::NotLoggedIn, "Please log in again.")
            .with_debug(ErrorDebug::for_base("https://acme.my.salesforce.com", Vec::new()));
        let command: CommandError = err.into();

        assert_eq!(command.code, "NOT_LOGGED_IN");
        assert_eq!(command.message, "Please log in again.");
        assert_eq!(
            command.debug.and_then(|debug| debug.api_base).as_deref(),
            Some("https://acme.my.salesforce.com")
        );
    }

    #[test]
    fn test_category_codes_serialize() {
        let command: CommandError = FieldLensError::new(
            ErrorCode::BestEffortFailed(Category::Flows),
            "Flow scan is unavailable in this org/API shape.",
        )
        .into();
        let json = serde_json::to_value(&command).expect("serialize error");
        assert_eq!(json["code"], "FLOW_BEST_EFFORT_FAILED");
        assert!(json.get("debug").is_none());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: CommandError = io_err.into();
        assert_eq!(err.code, "INTERNAL_ERROR");
        assert!(err.message.contains("pipe closed"));
    }
}
