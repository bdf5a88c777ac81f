//! Checkout: pricing the cart and turning it into an order.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument};

use food_client_core::{PaymentMethod, Price};

use crate::api::{ApiError, wire};
use crate::cart::{CartError, CartService};
use crate::models::Order;
use crate::orders::OrderClient;

/// Subtotals above this get free delivery.
const FREE_DELIVERY_ABOVE: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
const DELIVERY_FEE: Decimal = Decimal::from_parts(40, 0, 0, false, 0);
const PLATFORM_FEE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
/// Tax rate in percent.
const TAX_PERCENT: u32 = 5;

/// Price breakdown shown before placing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub subtotal: Price,
    pub delivery_fee: Price,
    pub platform_fee: Price,
    pub tax: Price,
    pub total: Price,
}

impl Quote {
    /// Price a cart subtotal.
    #[must_use]
    pub fn for_subtotal(subtotal: Price) -> Self {
        let currency = subtotal.currency_code;
        let delivery_fee = if subtotal.amount > FREE_DELIVERY_ABOVE {
            Price::new(Decimal::ZERO, currency)
        } else {
            Price::new(DELIVERY_FEE, currency)
        };
        let platform_fee = Price::new(PLATFORM_FEE, currency);
        let tax = subtotal.percent(TAX_PERCENT);

        Self {
            subtotal,
            delivery_fee,
            platform_fee,
            tax,
            total: subtotal + delivery_fee + platform_fee + tax,
        }
    }
}

/// What the customer entered at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub delivery_address: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

/// A successfully placed order.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub quote: Quote,
    /// Hosted payment page to open, for online payments.
    pub payment_url: Option<String>,
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("please log in first")]
    NotAuthenticated,

    #[error("your cart is empty")]
    EmptyCart,

    #[error("please enter a delivery address")]
    MissingAddress,

    /// The backend refused the order.
    #[error("{0}")]
    ServerRejected(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for CheckoutError {
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

impl CheckoutError {
    /// Text to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        const FALLBACK: &str = "Failed to place order";
        match self {
            Self::Api(e) => e.user_message(FALLBACK),
            Self::Cart(e) => e.user_message(FALLBACK),
            other => other.to_string(),
        }
    }
}

/// Place an order for the current cart.
///
/// The cart is reloaded first so the order is priced from the server's
/// view of it. After a successful order the local cart is cleared, except
/// for an online payment that returned a payment URL: that cart stays
/// until the payment completes.
///
/// # Errors
///
/// - `CheckoutError::MissingAddress` for a blank address
/// - `CheckoutError::NotAuthenticated` when signed out
/// - `CheckoutError::EmptyCart` when the cart has no lines
/// - `CheckoutError::ServerRejected` when the backend refuses the order
#[instrument(skip_all, fields(payment_method = ?request.payment_method))]
pub async fn place_order(
    cart: &CartService,
    orders: &OrderClient,
    request: &CheckoutRequest,
) -> Result<CheckoutReceipt, CheckoutError> {
    let address = request.delivery_address.trim();
    if address.is_empty() {
        return Err(CheckoutError::MissingAddress);
    }
    if !cart.session().is_authenticated().await {
        return Err(CheckoutError::NotAuthenticated);
    }

    let snapshot = cart.load().await?;
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let quote = Quote::for_subtotal(snapshot.subtotal());
    let body = wire::PlaceOrderBody {
        restaurant_id: snapshot.restaurant_id(),
        items: snapshot
            .lines()
            .iter()
            .map(|line| wire::OrderItemBody {
                food_item_id: line.food_item_id,
                quantity: line.quantity,
                price: line.unit_price.amount,
            })
            .collect(),
        total_price: quote.total.amount,
        delivery_address: address.to_owned(),
        notes: request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToOwned::to_owned),
        payment_method: request.payment_method,
    };

    let placed = orders.place(&body).await?;
    let payment_url = placed
        .payment_url
        .filter(|_| request.payment_method == PaymentMethod::Online);

    if payment_url.is_none() {
        cart.clear();
    }
    info!(order_id = %placed.order.id, total = %quote.total, "checkout complete");

    Ok(CheckoutReceipt {
        order: placed.order,
        quote,
        payment_url,
    })
}
