//! Login, session persistence and token refresh against the fake backend.
//!
//! Run with: cargo test -p food-client-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::http::Method;
use serde_json::json;

use food_client::session::LogoutReason;
use food_client::storage::keys;
use food_client::{ApiError, AuthError, MemoryStorage, SessionEvent, SessionState, SessionStorage};
use food_client_core::{Role, UserId};
use food_client_integration_tests::{FakeBackend, PASSWORD, REFRESH_TOKEN, USER_ID, credentials};

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_establishes_and_persists_session() {
    let backend = FakeBackend::start().await;
    let (client, storage) = backend.client().await;
    let mut events = client.session().subscribe();

    let session = client.auth().login(&credentials(PASSWORD)).await.unwrap();

    assert_eq!(session.user.id, UserId::new(USER_ID));
    assert_eq!(session.user.display_name, "Asha Rao");
    assert!(session.user.has_role(Role::Customer));
    assert_eq!(client.session().state().await, SessionState::Authenticated);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Authenticated {
            user_id: UserId::new(USER_ID)
        }
    );

    assert_eq!(
        storage.get(keys::ACCESS_TOKEN).unwrap().as_deref(),
        Some("access-1")
    );
    assert_eq!(
        storage.get(keys::REFRESH_TOKEN).unwrap().as_deref(),
        Some(REFRESH_TOKEN)
    );
    assert!(storage.contains(keys::USER));

    let login = &backend.requests_to(&Method::POST, "/auth/login").await[0];
    assert_eq!(login.body["email"], "asha@example.in");
    assert!(login.authorization.is_none());
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let backend = FakeBackend::start().await;
    let (client, storage) = backend.client().await;

    let err = client
        .auth()
        .login(&credentials("hunter2"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!client.session().is_authenticated().await);
    assert!(!storage.contains(keys::ACCESS_TOKEN));
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_login_without_token_is_malformed_and_changes_nothing() {
    let backend = FakeBackend::start().await;
    backend
        .set_login_response(json!({
            "data": { "message": "ok", "user": { "id": USER_ID } },
            "timestamp": "2026-10-19T12:00:00",
        }))
        .await;
    let (client, storage) = backend.client().await;

    let err = client.auth().login(&credentials(PASSWORD)).await.unwrap_err();

    assert!(matches!(err, AuthError::MalformedResponse("missing access token")));
    assert_eq!(client.session().state().await, SessionState::Unauthenticated);
    assert!(!storage.contains(keys::ACCESS_TOKEN));
    assert!(!storage.contains(keys::USER));
}

#[tokio::test]
async fn test_login_with_sentinel_token_is_malformed() {
    let backend = FakeBackend::start().await;
    backend
        .set_login_response(json!({ "accessToken": "undefined", "id": USER_ID }))
        .await;
    let (client, storage) = backend.client().await;

    let err = client.auth().login(&credentials(PASSWORD)).await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::MalformedResponse("access token is empty or a placeholder")
    ));
    assert!(!storage.contains(keys::ACCESS_TOKEN));
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_session_survives_restart() {
    let backend = FakeBackend::start().await;
    let (first, storage) = backend.signed_in_client().await;
    drop(first);

    let second = backend.client_with(Arc::clone(&storage)).await;
    assert_eq!(second.session().state().await, SessionState::Authenticated);
    assert_eq!(
        second.session().user_id().await,
        Some(UserId::new(USER_ID))
    );

    second.cart().load().await.unwrap();
    let load = &backend.requests_to(&Method::GET, "/cart").await[0];
    assert_eq!(load.authorization.as_deref(), Some("Bearer access-1"));
}

#[tokio::test]
async fn test_sentinel_token_in_storage_is_never_sent() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(MemoryStorage::with_entries([
        (keys::ACCESS_TOKEN, "undefined"),
        (keys::REFRESH_TOKEN, "null"),
        (
            keys::USER,
            r#"{"id":7,"displayName":"Asha Rao","email":"asha@example.in","roles":["ROLE_CUSTOMER"]}"#,
        ),
    ]));

    let client = backend.client_with(Arc::clone(&storage)).await;
    assert_eq!(client.session().state().await, SessionState::Unauthenticated);
    assert!(!storage.contains(keys::ACCESS_TOKEN));
    assert!(!storage.contains(keys::USER));

    client.catalog().restaurants().await.unwrap();
    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].authorization.is_none());
}

#[tokio::test]
async fn test_logout_clears_storage_and_notifies() {
    let backend = FakeBackend::start().await;
    let (client, storage) = backend.signed_in_client().await;
    let mut events = client.session().subscribe();

    client.auth().logout().await;

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::UserRequested
        }
    );
    for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
        assert!(!storage.contains(key), "{key} should be cleared");
    }
    assert!(client.session().current_user().await.is_none());
}

// ============================================================================
// Token refresh
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_replayed() {
    let backend = FakeBackend::start().await;
    let (client, storage) = backend.signed_in_client().await;
    backend.revoke_access_token().await;

    let orders = client.orders().list().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(backend.refresh_calls(), 1);

    let refresh = &backend.requests_to(&Method::POST, "/auth/refresh").await[0];
    assert_eq!(refresh.body, json!({ "token": REFRESH_TOKEN }));
    assert!(refresh.authorization.is_none());

    let sent = backend.requests_to(&Method::GET, "/orders").await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].authorization.as_deref(), Some("Bearer access-1"));
    assert_eq!(sent[1].authorization.as_deref(), Some("Bearer access-2"));

    // The refresh response carried no refresh token; the old one is kept.
    assert_eq!(
        storage.get(keys::ACCESS_TOKEN).unwrap().as_deref(),
        Some("access-2")
    );
    assert_eq!(
        storage.get(keys::REFRESH_TOKEN).unwrap().as_deref(),
        Some(REFRESH_TOKEN)
    );
    assert!(client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.signed_in_client().await;
    backend.revoke_access_token().await;

    let (orders, cart, profile, again) = tokio::join!(
        client.orders().list(),
        client.cart().load(),
        client.auth().fetch_profile(),
        client.orders().list(),
    );

    assert!(orders.is_ok());
    assert!(cart.is_ok());
    assert!(profile.is_ok());
    assert!(again.is_ok());
    assert_eq!(backend.refresh_calls(), 1);

    let replays = backend
        .requests()
        .await
        .into_iter()
        .filter(|r| r.authorization.as_deref() == Some("Bearer access-2"))
        .count();
    assert_eq!(replays, 4);
}

#[tokio::test]
async fn test_failed_refresh_expires_session() {
    let backend = FakeBackend::start().await;
    let (client, storage) = backend.signed_in_client().await;
    backend.fail_refresh();
    backend.revoke_access_token().await;
    let mut events = client.session().subscribe();

    let err = client.orders().list().await.unwrap_err();

    assert!(matches!(err, ApiError::AuthExpired));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::AuthExpired
        }
    );
    assert_eq!(client.session().state().await, SessionState::Unauthenticated);
    for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
        assert!(!storage.contains(key), "{key} should be cleared");
    }
    // No replay after a failed refresh.
    assert_eq!(backend.requests_to(&Method::GET, "/orders").await.len(), 1);
}

#[tokio::test]
async fn test_auth_endpoints_never_trigger_refresh() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.signed_in_client().await;

    // Signed in, so a token is attached, but a 401 from login is final.
    let err = client
        .auth()
        .login(&credentials("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(backend.refresh_calls(), 0);
    assert!(client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_profile_fetch_updates_stored_user() {
    let backend = FakeBackend::start().await;
    let (client, storage) = backend.signed_in_client().await;

    let profile = client.auth().fetch_profile().await.unwrap();

    assert_eq!(profile.id, UserId::new(USER_ID));
    let stored = storage.get(keys::USER).unwrap().unwrap();
    assert!(stored.contains("Asha Rao"));
}
