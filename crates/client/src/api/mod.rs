//! HTTP client wrapper for the food ordering REST API.
//!
//! Every backend call goes through [`ApiClient::execute`], which:
//!
//! - attaches `Authorization: Bearer <token>` when the session holds a valid
//!   access token, and an `x-request-id` header on every request
//! - unwraps the `{ data, timestamp }` response envelope
//! - classifies failures into [`ApiError`]
//! - on a 401 for a request that carried a token, refreshes the token once
//!   (single-flight across concurrent callers) and replays the request
//!
//! # Refresh coordination
//!
//! Each request remembers the session's token epoch at send time. A caller
//! that gets a 401 takes the refresh lock and compares epochs: if the token
//! changed while it waited, someone else already refreshed (or the session
//! ended), and the caller reuses that outcome instead of refreshing again.

mod error;
pub mod wire;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::session::{AccessToken, SessionStore};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A request that can be sent, and replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl RequestSpec {
    /// A request with the given method and path relative to the base URL.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_owned(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if `body` cannot be serialized.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// The path as given.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Auth endpoints answer 401 for bad credentials, never for an expired
    /// token, so they are excluded from refresh handling.
    fn is_auth_endpoint(&self) -> bool {
        self.path.trim_start_matches('/').starts_with("auth/")
    }
}

/// A response whose body has been read.
struct RawResponse {
    status: StatusCode,
    body: Vec<u8>,
}

/// HTTP client bound to one backend and one session.
///
/// Cheaply cloneable; clones share the connection pool, the session and the
/// refresh lock.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    session: SessionStore,
    /// Held for the duration of a token refresh.
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration, session: SessionStore) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("food-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Url::join replaces the last segment unless the base ends in '/'.
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url,
                session,
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Base URL all request paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Send a request and return its unwrapped JSON body.
    ///
    /// An empty body is returned as `Value::Null`.
    ///
    /// # Errors
    ///
    /// - `ApiError::Network` when no response arrives (including timeout)
    /// - `ApiError::Server` / `ApiError::Client` for 5xx / 4xx responses
    /// - `ApiError::AuthExpired` when a 401 could not be cured by a refresh
    /// - `ApiError::Decode` when a successful body is not JSON
    #[instrument(skip(self, spec), fields(method = %spec.method, path = %spec.path))]
    pub async fn execute(&self, spec: RequestSpec) -> Result<Value, ApiError> {
        let snapshot = self.inner.session.token_snapshot().await;
        let response = self.dispatch(&spec, snapshot.access.as_ref()).await?;

        if response.status == StatusCode::UNAUTHORIZED
            && snapshot.access.is_some()
            && !spec.is_auth_endpoint()
        {
            let token = self.refresh_after(snapshot.epoch).await?;
            // A second 401 is reported as-is; no further refresh.
            let replay = self.dispatch(&spec, Some(&token)).await?;
            return finish(replay);
        }

        finish(response)
    }

    async fn dispatch(
        &self,
        spec: &RequestSpec,
        token: Option<&AccessToken>,
    ) -> Result<RawResponse, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(spec.path.trim_start_matches('/'))?;
        if !spec.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&spec.query);
        }

        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .inner
            .http
            .request(spec.method.clone(), url)
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose());
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request.send().await.inspect_err(|e| {
            warn!(request_id = %request_id, error = %e, "request failed without a response");
        })?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        debug!(
            request_id = %request_id,
            status = status.as_u16(),
            authenticated = token.is_some(),
            "response received"
        );

        Ok(RawResponse { status, body })
    }

    /// Obtain a fresh access token after a 401 seen at `seen_epoch`.
    ///
    /// At most one refresh request is in flight; callers that waited on the
    /// lock reuse whatever the previous holder produced.
    async fn refresh_after(&self, seen_epoch: u64) -> Result<AccessToken, ApiError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let session = &self.inner.session;

        let current = session.token_snapshot().await;
        if current.epoch != seen_epoch {
            debug!("token changed while waiting, reusing it");
            return current.access.ok_or(ApiError::AuthExpired);
        }

        let Some(refresh) = session.refresh_token().await else {
            info!("access token rejected and no refresh token available");
            session.expire().await;
            return Err(ApiError::AuthExpired);
        };

        let outcome = async {
            let spec = RequestSpec::post("/auth/refresh").json(&wire::RefreshBody {
                token: refresh.expose(),
            })?;
            let body = finish(self.dispatch(&spec, None).await?)?;
            Ok::<_, ApiError>(wire::parse_refresh(&body)?)
        }
        .await;

        match outcome {
            Ok(tokens) => {
                let access = tokens.access.clone();
                if session.replace_tokens(tokens).await {
                    info!("access token refreshed");
                    Ok(access)
                } else {
                    Err(ApiError::AuthExpired)
                }
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                session.expire().await;
                Err(ApiError::AuthExpired)
            }
        }
    }
}

/// Classify a response and decode its body.
fn finish(response: RawResponse) -> Result<Value, ApiError> {
    let RawResponse { status, body } = response;

    if status.is_success() {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_slice(&body)?;
        return Ok(unwrap_envelope(value));
    }

    let message = error_message(&body);
    let status = status.as_u16();
    if status >= 500 {
        Err(ApiError::Server { status, message })
    } else {
        Err(ApiError::Client { status, message })
    }
}

/// Strip a `{ data, timestamp, ... }` envelope.
///
/// Only unwraps when `data` is an object, an array or null, so a payload
/// that merely has a `data` field is left alone.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map)
            if map.contains_key("timestamp")
                && map
                    .get("data")
                    .is_some_and(|d| d.is_object() || d.is_array() || d.is_null()) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// The `message` (or `error`) field of an error body.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let value = json!({ "data": { "id": 1 }, "timestamp": "2024-05-01T10:00:00", "success": true });
        assert_eq!(unwrap_envelope(value), json!({ "id": 1 }));

        let value = json!({ "data": [1, 2], "timestamp": 1 });
        assert_eq!(unwrap_envelope(value), json!([1, 2]));

        let value = json!({ "data": null, "timestamp": 1 });
        assert_eq!(unwrap_envelope(value), Value::Null);
    }

    #[test]
    fn test_non_envelopes_are_left_alone() {
        let no_timestamp = json!({ "data": { "id": 1 } });
        assert_eq!(unwrap_envelope(no_timestamp.clone()), no_timestamp);

        let scalar_data = json!({ "data": "text", "timestamp": 1 });
        assert_eq!(unwrap_envelope(scalar_data.clone()), scalar_data);
    }

    #[test]
    fn test_finish_empty_body_is_null() {
        assert_eq!(finish(raw(204, "")).unwrap(), Value::Null);
        assert_eq!(finish(raw(200, "  \n")).unwrap(), Value::Null);
    }

    #[test]
    fn test_finish_classifies_failures() {
        let err = finish(raw(400, r#"{"message":"Quantity too large"}"#)).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Client { status: 400, ref message } if message.as_deref() == Some("Quantity too large")
        ));

        let err = finish(raw(503, "<html>down</html>")).unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 503, message: None }));

        let err = finish(raw(404, r#"{"error":"Not Found"}"#)).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.server_message(), Some("Not Found"));
    }

    #[test]
    fn test_finish_rejects_non_json_success() {
        assert!(matches!(
            finish(raw(200, "OK")).unwrap_err(),
            ApiError::Decode(_)
        ));
    }

    #[test]
    fn test_auth_endpoints_are_detected() {
        assert!(RequestSpec::post("/auth/refresh").is_auth_endpoint());
        assert!(RequestSpec::post("auth/login").is_auth_endpoint());
        assert!(!RequestSpec::get("/cart").is_auth_endpoint());
        assert!(!RequestSpec::get("/authors").is_auth_endpoint());
    }

    #[test]
    fn test_base_url_keeps_prefix() {
        let session = SessionStore::new(Arc::new(crate::storage::MemoryStorage::new()));
        let client = ApiClient::new(
            Url::parse("http://localhost:8080/api/v1").unwrap(),
            Duration::from_secs(1),
            session,
        )
        .unwrap();

        let url = client.base_url().join("cart").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/cart");
    }
}
