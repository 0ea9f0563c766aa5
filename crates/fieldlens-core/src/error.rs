//! Core error types for the FieldLens engine.
//!
//! Every failure that can reach a caller is a [`FieldLensError`]: an explicit
//! [`ErrorCode`] from the scan taxonomy, a human-readable message, and an
//! optional structured diagnostic payload ([`ErrorDebug`]) carrying the
//! transport trail and the per-candidate failures that led to it.

use crate::types::Category;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Error taxonomy surfaced to callers.
///
/// The wire form is the upper snake case code (`NOT_LOGGED_IN`,
/// `FLOW_BEST_EFFORT_FAILED`, ...), produced by the `Display` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing or malformed request fields. Always the caller's fault.
    InvalidInput,
    /// No usable session at the current transport stage.
    NotLoggedIn,
    /// The org or user lacks access. Terminal: never retried elsewhere.
    InsufficientPermissions,
    /// Generic non-2xx answer that was not otherwise classified.
    ApiError,
    /// Transport-level failure (connection refused, DNS, TLS).
    NetworkError,
    /// A category could not be scanned at all in this org.
    ScanUnavailable(Category),
    /// A best-effort category exhausted every fallback shape.
    BestEffortFailed(Category),
    /// A delegated cross-context call exceeded its deadline.
    Timeout,
    /// The caller asked for an operation this host does not implement.
    UnknownAction,
    /// A tab-side fetch failed without producing an HTTP status.
    ProxyFetchFailed,
    /// The cache store could not be read or written.
    StorageError,
    /// Anything else.
    InternalError,
}

impl ErrorCode {
    /// Whether this code means retrying elsewhere cannot help.
    #[must_use]
    pub fn is_permission(self) -> bool {
        matches!(self, Self::InsufficientPermissions)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => f.write_str("INVALID_INPUT"),
            Self::NotLoggedIn => f.write_str("NOT_LOGGED_IN"),
            Self::InsufficientPermissions => f.write_str("INSUFFICIENT_PERMISSIONS"),
            Self::ApiError => f.write_str("API_ERROR"),
            Self::NetworkError => f.write_str("NETWORK_ERROR"),
            Self::ScanUnavailable(category) => {
                write!(f, "{}_SCAN_UNAVAILABLE", category.code_prefix())
            }
            Self::BestEffortFailed(category) => {
                write!(f, "{}_BEST_EFFORT_FAILED", category.code_prefix())
            }
            Self::Timeout => f.write_str("TIMEOUT"),
            Self::UnknownAction => f.write_str("UNKNOWN_ACTION"),
            Self::ProxyFetchFailed => f.write_str("PROXY_FETCH_FAILED"),
            Self::StorageError => f.write_str("STORAGE_ERROR"),
            Self::InternalError => f.write_str("INTERNAL_ERROR"),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Execution context a transport attempt ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStage {
    /// Plain fetch from the host's own HTTP client and cookie store.
    DirectCookie,
    /// Same request retried with the browser session id as a bearer token.
    BearerSession,
    /// Fetch delegated to the logged-in tab's isolated content context.
    TabRelay,
    /// Fetch executed inside the tab's top-level page context.
    MainWorld,
}

/// One entry of the per-request transport trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportTrace {
    /// Stage that produced this entry
    pub stage: TransportStage,
    /// Fully-qualified URL that was requested
    pub url: String,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    /// Content type, failure reason or other stage detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A failure recorded for one API base candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFailure {
    /// Origin that was tried
    pub candidate: String,
    /// Classification of the failure
    pub code: ErrorCode,
    /// Failure message
    pub message: String,
    /// Diagnostics attached to the failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
}

/// Structured diagnostics attached to an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDebug {
    /// API base the failing request was issued against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Transport stages attempted, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub debug_trail: Vec<TransportTrace>,
    /// Per-candidate failures when every origin was exhausted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateFailure>,
    /// Diagnostics of the underlying error this one wraps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<Box<ErrorDebug>>,
}

impl ErrorDebug {
    /// Diagnostics for a request against a single API base.
    #[must_use]
    pub fn for_base(api_base: impl Into<String>, debug_trail: Vec<TransportTrace>) -> Self {
        Self {
            api_base: Some(api_base.into()),
            debug_trail,
            ..Self::default()
        }
    }

    /// Diagnostics wrapping another error's diagnostics.
    #[must_use]
    pub fn nesting(inner: Option<ErrorDebug>) -> Option<Self> {
        inner.map(|inner| Self {
            nested: Some(Box::new(inner)),
            ..Self::default()
        })
    }
}

/// Engine-wide error.
///
/// Cheap to clone so a single failure can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct FieldLensError {
    /// Taxonomy code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional diagnostics
    pub debug: Option<ErrorDebug>,
}

impl FieldLensError {
    /// Create an error without diagnostics.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            debug: None,
        }
    }

    /// Attach diagnostics.
    #[must_use]
    pub fn with_debug(mut self, debug: ErrorDebug) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Shorthand for [`ErrorCode::InvalidInput`].
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Shorthand for [`ErrorCode::InternalError`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Whether retrying on another origin or stage is pointless.
    ///
    /// Salesforce sometimes reports access problems with a generic code, so
    /// any message mentioning "permission" counts as well.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.code.is_permission() || self.message.to_ascii_lowercase().contains("permission")
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `FieldLensError`.
pub type Result<T> = std::result::Result<T, FieldLensError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::NotLoggedIn.to_string(), "NOT_LOGGED_IN");
        assert_eq!(
            ErrorCode::BestEffortFailed(Category::Flows).to_string(),
            "FLOW_BEST_EFFORT_FAILED"
        );
        assert_eq!(
            ErrorCode::ScanUnavailable(Category::FieldPermissions).to_string(),
            "FLS_SCAN_UNAVAILABLE"
        );
    }

    #[test]
    fn test_error_display_is_message() {
        let err = FieldLensError::new(ErrorCode::ApiError, "No such column 'Body'");
        assert_eq!(err.to_string(), "No such column 'Body'");
    }

    #[test]
    fn test_permission_detection() {
        let err = FieldLensError::new(ErrorCode::InsufficientPermissions, "denied");
        assert!(err.is_permission_denied());

        let err = FieldLensError::new(ErrorCode::ApiError, "User lacks Permission to view");
        assert!(err.is_permission_denied());

        let err = FieldLensError::new(ErrorCode::NotLoggedIn, "session expired");
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_debug_serialization_skips_empty() {
        let debug = ErrorDebug::for_base("https://acme.my.salesforce.com", Vec::new());
        let json = serde_json::to_value(&debug).expect("serialize debug");
        assert_eq!(
            json,
            serde_json::json!({ "apiBase": "https://acme.my.salesforce.com" })
        );
    }

    #[test]
    fn test_candidate_failure_serializes_code_string() {
        let failure = CandidateFailure {
            candidate: "https://acme.my.salesforce.com".to_string(),
            code: ErrorCode::NotLoggedIn,
            message: "expired".to_string(),
            debug: None,
        };
        let json = serde_json::to_value(&failure).expect("serialize failure");
        assert_eq!(json["code"], "NOT_LOGGED_IN");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "cache.ttl_secs".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for cache.ttl_secs: must be positive"
        );
    }
}
