//! Orders: placement, lookup and status polling.

pub mod poller;
pub mod progress;

pub use poller::{PaymentVerification, PollHandle, PollOutcome, PollPolicy};
pub use progress::{ProgressStep, ProgressTracker};

use serde::de::Error as _;
use tracing::{info, instrument};

use food_client_core::OrderId;

use crate::api::{ApiClient, ApiError, RequestSpec, wire};
use crate::models::{Order, PlacedOrder};

/// Order endpoints of the backend.
#[derive(Clone)]
pub struct OrderClient {
    api: ApiClient,
}

impl OrderClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Submit a new order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend rejects the order or the response
    /// carries no order id.
    #[instrument(skip(self, body), fields(items = body.items.len()))]
    pub async fn place(&self, body: &wire::PlaceOrderBody) -> Result<PlacedOrder, ApiError> {
        let spec = RequestSpec::post("/orders").json(body)?;
        let response = self.api.execute(spec).await?;
        let placed = wire::parse_placed_order(&response)?;
        info!(
            order_id = %placed.order.id,
            online = placed.payment_url.is_some(),
            "order placed"
        );
        Ok(placed)
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the order cannot be read.
    #[instrument(skip(self))]
    pub async fn get(&self, order_id: OrderId) -> Result<Order, ApiError> {
        let body = self
            .api
            .execute(RequestSpec::get(format!("/orders/{order_id}")))
            .await?;
        Ok(wire::parse_order(&body)?)
    }

    /// The current user's orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Order>, ApiError> {
        let body = self.api.execute(RequestSpec::get("/orders")).await?;
        Ok(wire::parse_orders(&body))
    }

    /// Start an online payment and return the hosted payment page URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the response has no URL.
    #[instrument(skip(self))]
    pub async fn initiate_payment(&self, order_id: OrderId) -> Result<String, ApiError> {
        let body = self
            .api
            .execute(RequestSpec::post(format!("/payments/init/{order_id}")))
            .await?;
        wire::payment_url(&body)
            .ok_or_else(|| serde_json::Error::custom("payment response has no URL").into())
    }

    /// Poll an order until it is delivered or cancelled.
    #[must_use]
    pub fn track(&self, order_id: OrderId, policy: PollPolicy) -> PollHandle {
        let client = self.clone();
        poller::spawn(
            policy,
            move || {
                let client = client.clone();
                async move { client.get(order_id).await }
            },
            |order| order.status.is_terminal(),
        )
    }

    /// Poll an order until its payment is confirmed or attempts run out.
    pub async fn verify_payment(&self, order_id: OrderId, policy: PollPolicy) -> PaymentVerification {
        let client = self.clone();
        let handle = poller::spawn(
            policy,
            move || {
                let client = client.clone();
                async move { client.get(order_id).await }
            },
            Order::is_paid,
        );

        let verification = PaymentVerification::from(handle.outcome().await);
        info!(%order_id, ?verification, "payment verification finished");
        verification
    }
}
