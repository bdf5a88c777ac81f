//! Errors from the HTTP client wrapper.

use thiserror::Error;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connection failure or timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a 5xx status.
    #[error("server error ({status}){}", format_message(.message.as_deref()))]
    Server { status: u16, message: Option<String> },

    /// The backend rejected the request with a 4xx status.
    #[error("request rejected ({status}){}", format_message(.message.as_deref()))]
    Client { status: u16, message: Option<String> },

    /// The session expired and could not be refreshed.
    #[error("session expired, please log in again")]
    AuthExpired,

    /// A successful response did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request path could not be joined onto the base URL.
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

fn format_message(message: Option<&str>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

impl ApiError {
    /// HTTP status, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message supplied by the backend, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message, .. } | Self::Client { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the backend answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Client { status: 404, .. })
    }

    /// Whether the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_timeout())
    }

    /// Text to show the user: the backend's message verbatim, or `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::AuthExpired => self.to_string(),
            Self::Network(e) if e.is_timeout() => "The server took too long to respond".to_string(),
            _ => self
                .server_message()
                .map_or_else(|| fallback.to_string(), ToString::to_string),
        }
    }
}
