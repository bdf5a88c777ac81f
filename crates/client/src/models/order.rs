//! Order domain types.
//!
//! Orders are created by checkout and afterwards only change on the server;
//! the client observes them by polling.

use chrono::NaiveDateTime;

use food_client_core::{
    FoodItemId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price, RestaurantId,
};

/// A line of a placed order, priced at order time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub food_item_id: FoodItemId,
    pub food_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
}

/// When the order entered each status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderTimestamps {
    pub placed_at: Option<NaiveDateTime>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub preparing_at: Option<NaiveDateTime>,
    pub ready_at: Option<NaiveDateTime>,
    pub out_for_delivery_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
}

/// An order as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub order_number: Option<String>,
    pub restaurant_id: Option<RestaurantId>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    /// The backend's explicit paid flag.
    pub paid: bool,
    pub total_price: Price,
    pub timestamps: OrderTimestamps,
}

impl Order {
    /// Whether payment has been confirmed.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.paid || self.payment_status == Some(PaymentStatus::Paid)
    }

    /// Display reference: the order number if the backend issued one.
    #[must_use]
    pub fn reference(&self) -> String {
        self.order_number
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Time of the latest status change, falling back to the placement time.
    #[must_use]
    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        let t = &self.timestamps;
        let for_status = match self.status {
            OrderStatus::Confirmed => t.confirmed_at,
            OrderStatus::Preparing => t.preparing_at,
            OrderStatus::ReadyForPickup => t.ready_at,
            OrderStatus::OutForDelivery => t.out_for_delivery_at,
            OrderStatus::Delivered => t.delivered_at,
            OrderStatus::Cancelled => t.cancelled_at,
            OrderStatus::Pending | OrderStatus::Unknown => None,
        };
        for_status.or(t.placed_at)
    }

    /// Total number of items ordered.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// Result of submitting a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order: Order,
    /// Hosted payment page for online payments.
    pub payment_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|d| d.and_hms_opt(hour, 0, 0))
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(11),
            order_number: None,
            restaurant_id: None,
            status,
            items: vec![],
            delivery_address: "12 MG Road".to_string(),
            payment_method: Some(PaymentMethod::CashOnDelivery),
            payment_status: None,
            paid: false,
            total_price: Price::zero(),
            timestamps: OrderTimestamps {
                placed_at: at(10),
                preparing_at: at(11),
                ..OrderTimestamps::default()
            },
        }
    }

    #[test]
    fn test_last_updated_uses_status_timestamp() {
        assert_eq!(order(OrderStatus::Preparing).last_updated(), at(11));
    }

    #[test]
    fn test_last_updated_falls_back_to_placement() {
        assert_eq!(order(OrderStatus::Confirmed).last_updated(), at(10));
        assert_eq!(order(OrderStatus::Pending).last_updated(), at(10));
    }

    #[test]
    fn test_is_paid_checks_flag_and_status() {
        let mut o = order(OrderStatus::Pending);
        assert!(!o.is_paid());
        o.payment_status = Some(PaymentStatus::Paid);
        assert!(o.is_paid());
        o.payment_status = None;
        o.paid = true;
        assert!(o.is_paid());
    }

    #[test]
    fn test_reference_prefers_order_number() {
        let mut o = order(OrderStatus::Pending);
        assert_eq!(o.reference(), "11");
        o.order_number = Some("ORD-2024-0011".to_string());
        assert_eq!(o.reference(), "ORD-2024-0011");
    }
}
