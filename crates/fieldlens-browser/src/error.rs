use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("no open tab for {0}")]
    NoMatchingPage(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("untrusted origin pair: current={current} target={target}")]
    UntrustedOrigin { current: String, target: String },

    #[error("tab fetch failed (status {status}): {message}")]
    FetchFailed {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("relay channel closed")]
    RelayClosed,
}

impl BrowserError {
    /// HTTP status carried by the failure, 0 when none was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::FetchFailed { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
