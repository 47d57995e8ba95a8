//! Error types for the prayer-times client.

use thiserror::Error;

use crate::validate::ValidationError;

/// Failure to reach the remote API at all.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request timeout: API took too long to respond")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if is_tls_failure(std::error::Error::source(&e)) {
            Self::Tls(e.to_string())
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

const TLS_MARKERS: &[&str] = &["certificate", "tls", "ssl", "handshake"];

/// Whether anything in the source chain is a TLS handshake or certificate
/// failure. The top-level reqwest message carries the URL, so callers pass
/// its source.
fn is_tls_failure(mut current: Option<&(dyn std::error::Error + 'static)>) -> bool {
    while let Some(err) = current {
        let text = err.to_string().to_lowercase();
        if TLS_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        current = err.source();
    }
    false
}

#[derive(Error, Debug)]
pub enum PrayerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Target URL failed the host/scheme allowlist. Never retried.
    #[error("Security error: {0}")]
    Security(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API answered, but not with a usable success payload.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl PrayerError {
    pub(crate) fn security(message: impl Into<String>) -> Self {
        Self::Security(message.into())
    }

    pub(crate) fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.user_message(),
            Self::Security(_) => "The request target is not allowed.".to_string(),
            Self::Transport(TransportError::Timeout) => {
                "The prayer times service took too long to respond. Please try again.".to_string()
            }
            Self::Transport(_) => "Network error. Check your connection.".to_string(),
            Self::Api { status, .. } if *status >= 500 => {
                "The prayer times service is experiencing issues. Please try again later."
                    .to_string()
            }
            Self::Api { message, .. } => format!("Prayer times error: {}", message),
        }
    }

    /// Whether the caller may reasonably retry. Only transport failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type PrayerResult<T> = Result<T, PrayerError>;
