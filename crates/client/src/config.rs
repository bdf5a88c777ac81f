//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `FOOD_API_URL` - Backend base URL (default: `http://localhost:8080/api/v1`)
//! - `FOOD_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `FOOD_SESSION_FILE` - Where the session is persisted (default: `.food-session.json`)
//! - `FOOD_ORDER_POLL_INTERVAL_SECS` - Order tracking interval (default: 10)
//! - `FOOD_ORDER_POLL_MAX_ATTEMPTS` - Order tracking attempts (default: 360)
//! - `FOOD_PAYMENT_POLL_INTERVAL_SECS` - Payment confirmation interval (default: 2)
//! - `FOOD_PAYMENT_POLL_MAX_ATTEMPTS` - Payment confirmation attempts (default: 15)
//! - `FOOD_CATALOG_CACHE_TTL_SECS` - Restaurant/menu cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::orders::PollPolicy;

const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
const DEFAULT_SESSION_FILE: &str = ".food-session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Food client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.example.in/api/v1`
    pub api_url: Url,
    /// Timeout for each HTTP request
    pub http_timeout: Duration,
    /// Session persistence file
    pub session_file: PathBuf,
    pub order_poll: PollPolicy,
    pub payment_poll: PollPolicy,
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking (optional)
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Defaults for every setting, pointed at `api_url`.
    #[must_use]
    pub fn for_api(api_url: Url) -> Self {
        Self {
            api_url,
            http_timeout: Duration::from_secs(10),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            order_poll: PollPolicy::ORDER_TRACKING,
            payment_poll: PollPolicy::PAYMENT_CONFIRMATION,
            catalog_cache_ttl: crate::catalog::DEFAULT_CACHE_TTL,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from the environment, reading `.env` first if
    /// present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_url = match lookup("FOOD_API_URL") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::MissingEnvVar("FOOD_API_URL".to_string()));
            }
            Some(raw) => parse_api_url(raw.trim())?,
            None => parse_api_url(DEFAULT_API_URL)?,
        };

        let order_poll = PollPolicy {
            interval: env.seconds("FOOD_ORDER_POLL_INTERVAL_SECS", 10)?,
            max_attempts: env.parsed("FOOD_ORDER_POLL_MAX_ATTEMPTS", 360)?,
        };
        let payment_poll = PollPolicy {
            interval: env.seconds("FOOD_PAYMENT_POLL_INTERVAL_SECS", 2)?,
            max_attempts: env.parsed("FOOD_PAYMENT_POLL_MAX_ATTEMPTS", 15)?,
        };

        Ok(Self {
            api_url,
            http_timeout: env.seconds("FOOD_HTTP_TIMEOUT_SECS", 10)?,
            session_file: lookup("FOOD_SESSION_FILE")
                .filter(|p| !p.trim().is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from),
            order_poll,
            payment_poll,
            catalog_cache_ttl: env.seconds("FOOD_CATALOG_CACHE_TTL_SECS", 300)?,
            sentry_dsn: lookup("SENTRY_DSN").filter(|v| !v.trim().is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT").filter(|v| !v.trim().is_empty()),
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => Ok(default),
        }
    }

    /// A positive number of seconds.
    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        match self.parsed(key, default)? {
            0 => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be greater than zero".to_string(),
            )),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("FOOD_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "FOOD_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}
