//! Persistent session store.
//!
//! Single source of truth for who the current user is and whether they are
//! authenticated. The store is a leaf: it talks to durable storage but never
//! to the network. Login and token refresh happen elsewhere and hand their
//! results to [`SessionStore::establish`] and
//! [`SessionStore::replace_tokens`].
//!
//! # State machine
//!
//! ```text
//! Uninitialized --initialize()--> Unauthenticated | Authenticated
//! Unauthenticated --establish()--> Authenticated
//! Authenticated --logout() / expire()--> Unauthenticated
//! ```
//!
//! Every change of the token pair bumps an epoch counter. The HTTP client
//! records the epoch a request was sent with, which lets concurrent requests
//! that all saw a 401 tell whether someone else already refreshed.

mod token;

pub use token::{AccessToken, RefreshToken, TokenPair, is_sentinel};

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use food_client_core::{Role, UserId};

use crate::models::{ProfileUpdate, UserProfile};
use crate::storage::{SessionStorage, keys};

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 16;

/// Lifecycle state of the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `initialize()` has not run yet.
    Uninitialized,
    Unauthenticated,
    Authenticated,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user logged out.
    UserRequested,
    /// The access token expired and could not be refreshed.
    AuthExpired,
}

/// Notification broadcast to session dependents.
///
/// `LoggedOut` doubles as the "show the login screen" signal for the view
/// layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated { user_id: UserId },
    LoggedOut { reason: LogoutReason },
}

/// Errors from session transitions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// `initialize()` must run before a session can be established.
    #[error("session store has not been initialized")]
    NotInitialized,
}

/// An authenticated identity and its credentials.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// Access token as of a given epoch.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub access: Option<AccessToken>,
    pub epoch: u64,
}

/// Shared handle to the session store.
///
/// Cheaply cloneable; all clones see the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    storage: Arc<dyn SessionStorage>,
    state: RwLock<StoreState>,
    events: broadcast::Sender<SessionEvent>,
}

struct StoreState {
    phase: SessionState,
    session: Option<Session>,
    epoch: u64,
}

impl SessionStore {
    /// Create an uninitialized store over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionStoreInner {
                storage,
                state: RwLock::new(StoreState {
                    phase: SessionState::Uninitialized,
                    session: None,
                    epoch: 0,
                }),
                events,
            }),
        }
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Hydrate the session from durable storage.
    ///
    /// Authenticated only if a non-sentinel access token and a parseable user
    /// record are both stored. Storage failures degrade to unauthenticated.
    /// Has no effect once the store is initialized.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionState {
        let mut state = self.inner.state.write().await;
        if state.phase != SessionState::Uninitialized {
            return state.phase;
        }

        match self.storage_io(hydrate).await.flatten() {
            Some(session) => {
                let user_id = session.user.id;
                info!(user_id = %user_id, "session restored from storage");
                state.session = Some(session);
                state.phase = SessionState::Authenticated;
                state.epoch += 1;
                self.emit(SessionEvent::Authenticated { user_id });
            }
            None => {
                debug!("no valid session in storage");
                state.phase = SessionState::Unauthenticated;
            }
        }

        state.phase
    }

    /// Install a freshly authenticated session and persist it.
    ///
    /// Persistence failures are logged; the in-memory session is kept so the
    /// current process stays signed in.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInitialized` before `initialize()` has run.
    #[instrument(skip(self, user, tokens), fields(user_id = %user.id))]
    pub async fn establish(
        &self,
        user: UserProfile,
        tokens: TokenPair,
    ) -> Result<Session, SessionError> {
        let mut state = self.inner.state.write().await;
        if state.phase == SessionState::Uninitialized {
            return Err(SessionError::NotInitialized);
        }

        let session = Session { user, tokens };
        let (tokens, user) = (session.tokens.clone(), session.user.clone());
        self.storage_io(move |storage| {
            persist_tokens(storage, &tokens);
            persist_user(storage, &user);
        })
        .await;

        let user_id = session.user.id;
        state.session = Some(session.clone());
        state.phase = SessionState::Authenticated;
        state.epoch += 1;
        self.emit(SessionEvent::Authenticated { user_id });
        info!("session established");

        Ok(session)
    }

    /// Swap in a refreshed token pair.
    ///
    /// A refresh response without a refresh token keeps the previous one.
    /// Returns `false` (and changes nothing) when not authenticated.
    pub async fn replace_tokens(&self, tokens: TokenPair) -> bool {
        let mut state = self.inner.state.write().await;
        let Some(session) = state.session.as_mut() else {
            return false;
        };

        let refresh = tokens.refresh.or_else(|| session.tokens.refresh.take());
        session.tokens = TokenPair {
            access: tokens.access,
            refresh,
        };
        let tokens = session.tokens.clone();
        self.storage_io(move |storage| persist_tokens(storage, &tokens))
            .await;
        state.epoch += 1;
        debug!(epoch = state.epoch, "access token replaced");
        true
    }

    /// End the session at the user's request.
    pub async fn logout(&self) {
        self.end(LogoutReason::UserRequested).await;
    }

    /// End the session because the token could not be refreshed.
    pub async fn expire(&self) {
        self.end(LogoutReason::AuthExpired).await;
    }

    #[instrument(skip(self))]
    async fn end(&self, reason: LogoutReason) {
        let mut state = self.inner.state.write().await;
        self.storage_io(clear_stored).await;

        let was_authenticated = state.session.take().is_some();
        if state.phase != SessionState::Uninitialized {
            state.phase = SessionState::Unauthenticated;
        }
        state.epoch += 1;

        if was_authenticated {
            info!(?reason, "session ended");
            self.emit(SessionEvent::LoggedOut { reason });
        }
    }

    /// Merge `update` into the in-memory and persisted profile.
    ///
    /// Tokens are untouched. Returns the merged profile, or `None` when not
    /// authenticated.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Option<UserProfile> {
        let mut state = self.inner.state.write().await;
        let session = state.session.as_mut()?;
        update.apply_to(&mut session.user);
        let user = session.user.clone();
        self.persist_profile(user.clone()).await;
        Some(user)
    }

    /// Replace the profile with a fresh copy from the backend.
    ///
    /// Ignored when the id does not match the signed-in user.
    pub async fn replace_profile(&self, profile: UserProfile) -> Option<UserProfile> {
        let mut state = self.inner.state.write().await;
        let session = state.session.as_mut()?;
        if session.user.id != profile.id {
            warn!(
                current = %session.user.id,
                received = %profile.id,
                "ignoring profile for a different user"
            );
            return None;
        }
        session.user = profile.clone();
        self.persist_profile(profile.clone()).await;
        Some(profile)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.state.read().await.phase
    }

    /// Whether a user is signed in.
    pub async fn is_authenticated(&self) -> bool {
        self.state().await == SessionState::Authenticated
    }

    /// The full current session.
    pub async fn session(&self) -> Option<Session> {
        self.inner.state.read().await.session.clone()
    }

    /// Profile of the signed-in user.
    pub async fn current_user(&self) -> Option<UserProfile> {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Id of the signed-in user.
    pub async fn user_id(&self) -> Option<UserId> {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.user.id)
    }

    /// The single authorization check: whether the signed-in user holds
    /// `role`. Always `false` when signed out.
    pub async fn has_role(&self, role: Role) -> bool {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .is_some_and(|s| s.user.has_role(role))
    }

    /// The access token together with the epoch it belongs to.
    pub async fn token_snapshot(&self) -> TokenSnapshot {
        let state = self.inner.state.read().await;
        TokenSnapshot {
            access: state.session.as_ref().map(|s| s.tokens.access.clone()),
            epoch: state.epoch,
        }
    }

    /// The refresh token, if any.
    pub async fn refresh_token(&self) -> Option<RefreshToken> {
        self.inner
            .state
            .read()
            .await
            .session
            .as_ref()
            .and_then(|s| s.tokens.refresh.clone())
    }

    // =========================================================================
    // Storage I/O
    // =========================================================================

    /// Run blocking storage I/O on the blocking pool.
    ///
    /// Callers keep holding the state lock across the await, so storage
    /// writes happen in the same order as the in-memory transitions.
    async fn storage_io<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&dyn SessionStorage) -> T + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.inner.storage);
        tokio::task::spawn_blocking(move || op(storage.as_ref()))
            .await
            .inspect_err(|e| warn!(error = %e, "session storage task failed"))
            .ok()
    }

    async fn persist_profile(&self, user: UserProfile) {
        self.storage_io(move |storage| persist_user(storage, &user)).await;
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

// =============================================================================
// Storage helpers
// =============================================================================

fn hydrate(storage: &dyn SessionStorage) -> Option<Session> {
    let read = |key| match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, key, "failed to read stored session value");
            None
        }
    };

    let access = read(keys::ACCESS_TOKEN);
    let refresh = read(keys::REFRESH_TOKEN);
    let user = read(keys::USER);

    let tokens = TokenPair::from_raw(access.as_deref(), refresh.as_deref());
    let profile = user.as_deref().and_then(|raw| {
        serde_json::from_str::<UserProfile>(raw)
            .inspect_err(|e| warn!(error = %e, "stored user record is unreadable"))
            .ok()
    });

    if let (Some(tokens), Some(user)) = (tokens, profile) {
        return Some(Session { user, tokens });
    }

    // Half-written or sentinel leftovers; drop them so they are not
    // mistaken for a session later.
    if access.is_some() || refresh.is_some() || user.is_some() {
        clear_stored(storage);
    }
    None
}

fn clear_stored(storage: &dyn SessionStorage) {
    for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
        if let Err(e) = storage.remove(key) {
            warn!(error = %e, key, "failed to clear stored session value");
        }
    }
}

fn persist_tokens(storage: &dyn SessionStorage, tokens: &TokenPair) {
    if let Err(e) = storage.set(keys::ACCESS_TOKEN, tokens.access.expose()) {
        warn!(error = %e, "failed to persist access token");
    }
    let result = match &tokens.refresh {
        Some(refresh) => storage.set(keys::REFRESH_TOKEN, refresh.expose()),
        None => storage.remove(keys::REFRESH_TOKEN),
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to persist refresh token");
    }
}

fn persist_user(storage: &dyn SessionStorage, user: &UserProfile) {
    match serde_json::to_string(user) {
        Ok(json) => {
            if let Err(e) = storage.set(keys::USER, &json) {
                warn!(error = %e, "failed to persist user profile");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize user profile"),
    }
}
