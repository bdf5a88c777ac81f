//! Bearer and refresh tokens.
//!
//! Browsers that stored `undefined` or `null` in local storage left those
//! literal strings behind as token values. A token is only constructed from
//! text that is non-empty and not one of those sentinels, so code holding an
//! [`AccessToken`] can attach it without further checks.

use secrecy::{ExposeSecret, SecretString};

/// Literal values that mean "no token".
const SENTINELS: &[&str] = &["undefined", "null"];

/// Whether a raw stored token value stands for "no token".
#[must_use]
pub fn is_sentinel(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || SENTINELS.contains(&trimmed)
}

/// A bearer access token that is known not to be a sentinel.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Parse a raw token; `None` for empty or sentinel values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        (!is_sentinel(raw)).then(|| Self(SecretString::from(raw.trim().to_owned())))
    }

    /// The token text, for building the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// A refresh token that is known not to be a sentinel.
#[derive(Clone)]
pub struct RefreshToken(SecretString);

impl RefreshToken {
    /// Parse a raw token; `None` for empty or sentinel values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        (!is_sentinel(raw)).then(|| Self(SecretString::from(raw.trim().to_owned())))
    }

    /// The token text, for the refresh request body.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken([REDACTED])")
    }
}

/// Access token plus the optional refresh token issued with it.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: Option<RefreshToken>,
}

impl TokenPair {
    /// Build a pair from raw strings as returned by the backend.
    ///
    /// Returns `None` when the access token is missing or a sentinel.
    #[must_use]
    pub fn from_raw(access: Option<&str>, refresh: Option<&str>) -> Option<Self> {
        Some(Self {
            access: AccessToken::parse(access?)?,
            refresh: refresh.and_then(RefreshToken::parse),
        })
    }
}
