//! Crate-level error type.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Any error the food client can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// Text to show the user: the backend's message where there is one,
    /// otherwise a short generic description.
    #[must_use]
    pub fn user_message(&self) -> String {
        const FALLBACK: &str = "Something went wrong, please try again";
        match self {
            Self::Api(e) => e.user_message(FALLBACK),
            Self::Auth(e) => e.user_message(FALLBACK),
            Self::Cart(e) => e.user_message(FALLBACK),
            Self::Checkout(e) => e.user_message(),
            Self::Config(_) | Self::Session(_) | Self::Storage(_) => self.to_string(),
        }
    }
}

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_passes_server_text_through() {
        let err = Error::from(CartError::ServerRejected("Out of stock".to_string()));
        assert_eq!(err.user_message(), "Out of stock");

        let err = Error::from(ApiError::Server {
            status: 500,
            message: None,
        });
        assert_eq!(err.user_message(), "Something went wrong, please try again");
    }
}
