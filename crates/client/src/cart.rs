//! Cart synchronization.
//!
//! The backend owns the cart. [`CartService`] keeps a local snapshot for
//! display and, after every successful mutation, reloads the whole cart
//! rather than patching the snapshot, so server-side pricing and
//! availability rules are always reflected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use food_client_core::{CartLineId, FoodItemId, Price, UserId};

use crate::api::{ApiClient, ApiError, RequestSpec, wire};
use crate::models::Cart;
use crate::session::{SessionEvent, SessionStore};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No user is signed in.
    #[error("please log in first")]
    NotAuthenticated,

    /// Quantities below 1 cannot be added.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The backend refused the change (stock, closed restaurant, ...).
    #[error("{0}")]
    ServerRejected(String),

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for CartError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Client {
                message: Some(message),
                ..
            }
            | ApiError::Server {
                message: Some(message),
                ..
            } => Self::ServerRejected(message),
            other => Self::Api(other),
        }
    }
}

impl CartError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api(e) => e.user_message(fallback),
            other => other.to_string(),
        }
    }
}

/// Client-side cache of the user's server cart.
///
/// Cheaply cloneable; clones share the snapshot.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartServiceInner>,
}

struct CartServiceInner {
    api: ApiClient,
    cart: watch::Sender<Cart>,
    /// Bumped by every clear; a load started under an older value is stale.
    generation: AtomicU64,
    /// Number of mutation round trips in flight.
    busy: AtomicUsize,
}

/// Marks the service busy until dropped.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CartService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                api,
                cart: watch::Sender::new(Cart::empty()),
                generation: AtomicU64::new(0),
                busy: AtomicUsize::new(0),
            }),
        }
    }

    /// The session this cart belongs to.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.inner.api.session()
    }

    async fn require_user(&self) -> Result<UserId, CartError> {
        self.session()
            .user_id()
            .await
            .ok_or(CartError::NotAuthenticated)
    }

    // =========================================================================
    // Server round trips
    // =========================================================================

    /// Fetch the cart from the backend and replace the local snapshot.
    ///
    /// A 404 or an empty body means the user has no cart yet. When signed
    /// out the snapshot is cleared. On failure the previous snapshot is kept.
    ///
    /// If the session ended or changed hands, or the cart was cleared, while
    /// the request was in flight, the response is discarded and an empty cart
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Api` if the request fails.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Cart, CartError> {
        let Some(user_id) = self.session().user_id().await else {
            self.clear();
            return Ok(Cart::empty());
        };
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let spec = RequestSpec::get("/cart").query("userId", user_id);
        let cart = match self.inner.api.execute(spec).await {
            Ok(body) => wire::parse_cart(&body),
            Err(e) if e.is_not_found() => Cart::empty(),
            Err(e) => {
                warn!(error = %e, "failed to load cart, keeping previous snapshot");
                return Err(CartError::Api(e));
            }
        };

        let same_user = self.session().user_id().await == Some(user_id);
        let stored = same_user
            && self.inner.cart.send_if_modified(|snapshot| {
                if self.inner.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *snapshot = cart.clone();
                true
            });
        if !stored {
            debug!(%user_id, "session changed during cart load, discarding response");
            return Ok(Cart::empty());
        }

        debug!(
            lines = cart.lines().len(),
            items = cart.item_count(),
            "cart loaded"
        );
        Ok(cart)
    }

    /// Add `quantity` of a food item, then reload.
    ///
    /// # Errors
    ///
    /// - `CartError::NotAuthenticated` when signed out (no request is sent)
    /// - `CartError::InvalidQuantity` for a quantity of 0
    /// - `CartError::ServerRejected` when the backend refuses the item
    #[instrument(skip(self))]
    pub async fn add_item(&self, food_item_id: FoodItemId, quantity: u32) -> Result<Cart, CartError> {
        let user_id = self.require_user().await?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let _busy = BusyGuard::enter(&self.inner.busy);
        let spec = RequestSpec::post("/cart").json(&wire::AddToCartBody {
            food_item_id,
            quantity,
            user_id,
        })?;
        self.inner.api.execute(spec).await?;
        info!(%food_item_id, quantity, "added to cart");

        self.load().await
    }

    /// Set a line's quantity, then reload.
    ///
    /// A quantity below 1 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` when signed out or
    /// `CartError::ServerRejected` when the backend refuses the change.
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, line_id: CartLineId, quantity: i64) -> Result<Cart, CartError> {
        if quantity < 1 {
            return self.remove_item(line_id).await;
        }
        self.require_user().await?;

        let _busy = BusyGuard::enter(&self.inner.busy);
        let spec = RequestSpec::put(format!("/cart/{line_id}")).query("quantity", quantity);
        self.inner.api.execute(spec).await?;

        self.load().await
    }

    /// Remove a line, then reload.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` when signed out or
    /// `CartError::ServerRejected` when the backend refuses the change.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, line_id: CartLineId) -> Result<Cart, CartError> {
        self.require_user().await?;

        let _busy = BusyGuard::enter(&self.inner.busy);
        self.inner
            .api
            .execute(RequestSpec::delete(format!("/cart/{line_id}")))
            .await?;
        info!(%line_id, "removed from cart");

        self.load().await
    }

    // =========================================================================
    // Local state
    // =========================================================================

    /// Empty the local snapshot without contacting the backend.
    ///
    /// Used after a successful order, where the backend empties the cart on
    /// its side, and on logout.
    ///
    /// Loads already in flight will not write their response.
    pub fn clear(&self) {
        self.inner.cart.send_modify(|snapshot| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *snapshot = Cart::empty();
        });
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.inner.cart.borrow().clone()
    }

    /// Total number of items in the snapshot.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.inner.cart.borrow().item_count()
    }

    /// Sum of line totals in the snapshot.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.inner.cart.borrow().subtotal()
    }

    /// Follow the snapshot. Every completed reload and every clear is
    /// published, even when the lines did not change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.inner.cart.subscribe()
    }

    /// Whether a mutation round trip is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst) > 0
    }

    /// Keep the snapshot in step with the session.
    ///
    /// Reloads when a user signs in and clears when the session ends. The
    /// listener runs until the session store is dropped or the returned
    /// handle is aborted.
    #[must_use]
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut events = self.session().subscribe();
        let service = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Authenticated { user_id }) => {
                        debug!(%user_id, "session started, loading cart");
                        if let Err(e) = service.load().await {
                            warn!(error = %e, "cart load after sign-in failed");
                        }
                    }
                    Ok(SessionEvent::LoggedOut { reason }) => {
                        debug!(?reason, "session ended, clearing cart");
                        service.clear();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed session events, resyncing cart");
                        if let Err(e) = service.load().await {
                            warn!(error = %e, "cart resync failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::storage::MemoryStorage;

    fn service() -> CartService {
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        // Nothing listens here; signed-out calls must fail before any I/O.
        let api = ApiClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_millis(50),
            session,
        )
        .unwrap();
        CartService::new(api)
    }

    #[tokio::test]
    async fn test_mutations_require_session() {
        let cart = service();
        cart.session().initialize().await;

        assert!(matches!(
            cart.add_item(FoodItemId::new(1), 1).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(matches!(
            cart.set_quantity(CartLineId::new(1), 2).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(matches!(
            cart.set_quantity(CartLineId::new(1), 0).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(matches!(
            cart.remove_item(CartLineId::new(1)).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(!cart.is_busy());
    }

    #[tokio::test]
    async fn test_load_when_signed_out_is_empty() {
        let cart = service();
        cart.session().initialize().await;
        assert!(cart.load().await.unwrap().is_empty());
        assert_eq!(cart.item_count(), 0);
        assert!(cart.subtotal().is_zero());
    }

    #[test]
    fn test_busy_guard_counts_nested_round_trips() {
        let counter = AtomicUsize::new(0);
        let outer = BusyGuard::enter(&counter);
        {
            let _inner = BusyGuard::enter(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(outer);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejections_carry_server_message() {
        let err: CartError = ApiError::Client {
            status: 400,
            message: Some("Item unavailable".to_string()),
        }
        .into();
        assert_eq!(err.user_message("Failed to add"), "Item unavailable");

        let err: CartError = ApiError::Server {
            status: 500,
            message: None,
        }
        .into();
        assert_eq!(err.user_message("Failed to add"), "Failed to add");
    }
}
