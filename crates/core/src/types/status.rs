//! Roles and status enums.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role held by an authenticated user.
///
/// A user may hold several roles; authorization checks test membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_CUSTOMER")]
    Customer,
    #[serde(rename = "ROLE_RESTAURANT_OWNER")]
    RestaurantOwner,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    /// Wire name used by the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "ROLE_CUSTOMER",
            Self::RestaurantOwner => "ROLE_RESTAURANT_OWNER",
            Self::Admin => "ROLE_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts `ROLE_CUSTOMER`, `CUSTOMER` or `customer` (and likewise for the
    /// other roles); `OWNER` is accepted for the restaurant owner role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match bare {
            "CUSTOMER" | "USER" => Ok(Self::Customer),
            "RESTAURANT_OWNER" | "OWNER" => Ok(Self::RestaurantOwner),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Lifecycle status of an order, as reported by the backend.
///
/// The non-terminal statuses form a strict forward progression; see
/// [`OrderStatus::PROGRESSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// The forward progression of an order that is not cancelled.
    pub const PROGRESSION: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::ReadyForPickup,
        Self::OutForDelivery,
        Self::Delivered,
    ];

    /// Whether no further transition is expected.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position of this status in [`Self::PROGRESSION`].
    ///
    /// `None` for `Cancelled` and `Unknown`, which are not on the happy path.
    #[must_use]
    pub fn progress_index(self) -> Option<usize> {
        Self::PROGRESSION.iter().position(|s| *s == self)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Order Placed",
            Self::Confirmed => "Confirmed",
            Self::Preparing => "Preparing",
            Self::ReadyForPickup => "Ready",
            Self::OutForDelivery => "On the Way",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How an order is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    #[serde(rename = "COD")]
    CashOnDelivery,
    /// Paid through the hosted payment page.
    #[serde(rename = "ONLINE")]
    Online,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" | "cash" => Ok(Self::CashOnDelivery),
            "online" | "card" | "upi" => Ok(Self::Online),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    #[serde(other)]
    Unknown,
}
