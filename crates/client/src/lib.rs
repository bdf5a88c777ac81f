//! Session, cart and order synchronization client for the food ordering
//! REST API.
//!
//! # Architecture
//!
//! - [`session`] - persistent session store, the single source of truth for
//!   who is signed in
//! - [`api`] - HTTP wrapper: bearer tokens, response envelopes, single-flight
//!   token refresh
//! - [`cart`] - server-authoritative cart with reload-after-write
//! - [`orders`] - order placement and bounded status polling
//! - [`auth`], [`catalog`], [`checkout`] - the flows built on top
//!
//! [`FoodClient`] wires these together over one configuration, the way a
//! view layer would hold them for the lifetime of the process.
//!
//! # Example
//!
//! ```no_run
//! use food_client::{ClientConfig, FoodClient};
//!
//! # async fn run() -> food_client::Result<()> {
//! let client = FoodClient::from_config(ClientConfig::from_env()?)?;
//! client.start().await;
//! let cart = client.cart().load().await?;
//! println!("{} items", cart.item_count());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod session;
pub mod storage;

use std::sync::{Arc, OnceLock};

use food_client_core::OrderId;
use tokio::task::JoinHandle;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthService, OtpOutcome};
pub use cart::{CartError, CartService};
pub use catalog::CatalogClient;
pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutRequest, Quote};
pub use config::{ClientConfig, ConfigError};
pub use error::{Error, Result};
pub use orders::{OrderClient, PaymentVerification, PollHandle, PollOutcome, PollPolicy};
pub use session::{SessionEvent, SessionState, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// All client services over one configuration and one session.
///
/// Cheaply cloneable; clones share every service.
#[derive(Clone)]
pub struct FoodClient {
    config: Arc<ClientConfig>,
    session: SessionStore,
    api: ApiClient,
    auth: AuthService,
    cart: CartService,
    orders: OrderClient,
    catalog: CatalogClient,
    cart_watch: Arc<CartWatch>,
}

/// The cart's session listener, stopped when the last client clone drops.
#[derive(Default)]
struct CartWatch(OnceLock<JoinHandle<()>>);

impl Drop for CartWatch {
    fn drop(&mut self) {
        if let Some(handle) = self.0.get() {
            handle.abort();
        }
    }
}

impl FoodClient {
    /// Build the services with the session persisted in `storage`.
    ///
    /// The session is not read until [`Self::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns `Error::Api` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let session = SessionStore::new(storage);
        let api = ApiClient::new(config.api_url.clone(), config.http_timeout, session.clone())?;

        Ok(Self {
            auth: AuthService::new(api.clone()),
            cart: CartService::new(api.clone()),
            orders: OrderClient::new(api.clone()),
            catalog: CatalogClient::new(api.clone(), config.catalog_cache_ttl),
            cart_watch: Arc::default(),
            config: Arc::new(config),
            session,
            api,
        })
    }

    /// Build the services with the session persisted to the configured file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Api` if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let storage = Arc::new(FileStorage::new(config.session_file.clone()));
        Self::new(config, storage)
    }

    /// Restore any persisted session and keep the cart in step with it.
    ///
    /// From here on the cart is loaded whenever a user signs in (including a
    /// restored session) and cleared when the session ends.
    pub async fn start(&self) -> SessionState {
        self.cart_watch.0.get_or_init(|| self.cart.watch_session());
        self.session.initialize().await
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub const fn cart(&self) -> &CartService {
        &self.cart
    }

    #[must_use]
    pub const fn orders(&self) -> &OrderClient {
        &self.orders
    }

    #[must_use]
    pub const fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Place an order for the current cart.
    ///
    /// # Errors
    ///
    /// See [`checkout::place_order`].
    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
    ) -> std::result::Result<CheckoutReceipt, CheckoutError> {
        checkout::place_order(&self.cart, &self.orders, request).await
    }

    /// Track an order with the configured order polling policy.
    #[must_use]
    pub fn track_order(&self, order_id: OrderId) -> PollHandle {
        self.orders.track(order_id, self.config.order_poll)
    }

    /// Wait for an online payment with the configured payment polling
    /// policy.
    pub async fn verify_payment(&self, order_id: OrderId) -> PaymentVerification {
        self.orders
            .verify_payment(order_id, self.config.payment_poll)
            .await
    }
}
