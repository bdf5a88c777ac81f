use thiserror::Error;

use food_client_core::EmailError;

use crate::api::ApiError;
use crate::session::SessionError;

/// Errors from login, signup and profile operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The email address is not well formed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// A required field is missing or blank.
    #[error("{0}")]
    InvalidInput(&'static str),

    /// The backend refused the request for another reason.
    #[error("{0}")]
    ServerRejected(String),

    /// A success response lacked what the operation needs.
    #[error("unexpected response from server: {0}")]
    MalformedResponse(&'static str),

    /// The operation needs a signed-in user.
    #[error("not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Client { status, message } => {
                Self::ServerRejected(message.unwrap_or_else(|| format!("request rejected ({status})")))
            }
            other => Self::Api(other),
        }
    }
}

impl AuthError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api(e) => e.user_message(fallback),
            Self::MalformedResponse(_) | Self::Session(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}
