//! Login, signup, OTP verification and profile sync.
//!
//! Composes the HTTP client and the session store: requests go through
//! [`ApiClient`], and successful logins are handed to
//! [`SessionStore::establish`]. Nothing is persisted unless the whole flow
//! succeeds.

mod error;

pub use error::AuthError;

use secrecy::ExposeSecret;
use tracing::{info, instrument};

use food_client_core::Email;

use crate::api::{ApiClient, ApiError, RequestSpec, wire};
use crate::models::{Credentials, ProfileUpdate, SignupRequest, UserProfile};
use crate::session::{Session, SessionStore};

/// Result of verifying a signup OTP.
#[derive(Debug, Clone)]
pub enum OtpOutcome {
    /// The account is verified; the user still has to log in.
    Verified { message: String },
    /// The backend issued tokens along with the verification.
    SignedIn(Session),
}

/// Authentication flows over a shared API client and session.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn session(&self) -> &SessionStore {
        self.api.session()
    }

    /// Log in with email and password.
    ///
    /// On success the session is established and persisted. On any error the
    /// session is left as it was.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidInput` for a blank password
    /// - `AuthError::InvalidCredentials` when the backend answers 401/403
    /// - `AuthError::ServerRejected` for any other rejection
    /// - `AuthError::MalformedResponse` when the response has no usable
    ///   access token or no user id
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let password = credentials.password.expose_secret();
        if password.trim().is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        let spec = RequestSpec::post("/auth/login").json(&wire::LoginBody {
            email: credentials.email.as_str(),
            password,
        })?;
        let body = self.api.execute(spec).await.map_err(|e| match e {
            ApiError::Client {
                status: 401 | 403, ..
            } => AuthError::InvalidCredentials,
            other => other.into(),
        })?;

        let payload = wire::parse_auth(&body).map_err(ApiError::from)?;
        let Some(tokens) = payload.tokens else {
            return Err(AuthError::MalformedResponse(if payload.has_token_field {
                "access token is empty or a placeholder"
            } else {
                "missing access token"
            }));
        };
        let user = payload
            .user
            .ok_or(AuthError::MalformedResponse("missing user id"))?;

        let session = self.session().establish(user, tokens).await?;
        info!(user_id = %session.user.id, "logged in");
        Ok(session)
    }

    /// Register a new account. The backend emails an OTP.
    ///
    /// Returns the backend's acknowledgment message.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` for a blank name or password, or
    /// `AuthError::ServerRejected` if the backend refuses the signup.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: &SignupRequest) -> Result<String, AuthError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("name is required"));
        }
        let password = request.password.expose_secret();
        if password.trim().is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        let spec = RequestSpec::post("/auth/signup").json(&wire::SignupBody {
            name,
            email: request.email.as_str(),
            password,
            phone: request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
            role: request.role,
        })?;
        let body = self.api.execute(spec).await?;

        Ok(wire::ack_message(&body)
            .unwrap_or_else(|| "Signup successful, check your email for the OTP".to_string()))
    }

    /// Verify the OTP sent after signup.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` for a blank OTP, or
    /// `AuthError::ServerRejected` if the backend refuses it.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &Email, otp: &str) -> Result<OtpOutcome, AuthError> {
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(AuthError::InvalidInput("OTP is required"));
        }

        let spec = RequestSpec::post("/auth/otp").json(&wire::OtpBody {
            email: email.as_str(),
            otp,
        })?;
        let body = self.api.execute(spec).await?;

        if let Ok(payload) = wire::parse_auth(&body)
            && let (Some(tokens), Some(user)) = (payload.tokens, payload.user)
        {
            let session = self.session().establish(user, tokens).await?;
            info!(user_id = %session.user.id, "verified and logged in");
            return Ok(OtpOutcome::SignedIn(session));
        }

        Ok(OtpOutcome::Verified {
            message: wire::ack_message(&body).unwrap_or_else(|| "Email verified".to_string()),
        })
    }

    /// End the session locally.
    pub async fn logout(&self) {
        self.session().logout().await;
    }

    /// Fetch the profile from the backend and store it in the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when signed out, or the API
    /// error if the request fails.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        if !self.session().is_authenticated().await {
            return Err(AuthError::NotAuthenticated);
        }

        let body = self.api.execute(RequestSpec::get("/users/user-profile")).await?;
        let profile = wire::parse_profile(&body).map_err(ApiError::from)?;

        Ok(self
            .session()
            .replace_profile(profile.clone())
            .await
            .unwrap_or(profile))
    }

    /// Save a partial profile update to the backend, then merge it into the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when signed out, or the API
    /// error if the backend refuses the update.
    #[instrument(skip(self, update))]
    pub async fn save_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let session = self.session();
        let Some(current) = session.current_user().await else {
            return Err(AuthError::NotAuthenticated);
        };
        if update.is_empty() {
            return Ok(current);
        }

        let spec = RequestSpec::patch("/users/profile").json(update)?;
        self.api.execute(spec).await?;

        session
            .update_profile(update)
            .await
            .ok_or(AuthError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_rejection_maps_to_server_message() {
        let err: AuthError = ApiError::Client {
            status: 409,
            message: Some("Email already registered".to_string()),
        }
        .into();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[test]
    fn test_server_errors_stay_api_errors() {
        let err: AuthError = ApiError::Server {
            status: 500,
            message: None,
        }
        .into();
        assert!(matches!(err, AuthError::Api(_)));
        assert_eq!(err.user_message("Login failed"), "Login failed");
    }
}
