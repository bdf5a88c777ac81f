//! Cart domain types.
//!
//! The cart is a cache of server state. Aggregates are computed from the
//! lines on every call and never stored alongside them.

use food_client_core::{CartLineId, FoodItemId, Price, RestaurantId};

/// One food item and its quantity in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Server id of the cart line (used for update and delete).
    pub id: CartLineId,
    pub food_item_id: FoodItemId,
    pub food_name: String,
    pub unit_price: Price,
    /// Always at least 1.
    pub quantity: u32,
    pub image_url: Option<String>,
    pub restaurant_id: Option<RestaurantId>,
}

impl CartLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Snapshot of the user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Build a cart from lines, dropping any line whose quantity is zero.
    #[must_use]
    pub fn new(lines: Vec<CartLine>) -> Self {
        let lines = lines.into_iter().filter(|l| l.quantity >= 1).collect();
        Self { lines }
    }

    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// The cart lines in server order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of items (sum of quantities).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Look up a line by its id.
    #[must_use]
    pub fn line(&self, id: CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// Look up the line holding a food item.
    #[must_use]
    pub fn line_for_food(&self, food_item_id: FoodItemId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.food_item_id == food_item_id)
    }

    /// Restaurant the cart is ordering from, taken from the first line
    /// that knows it.
    #[must_use]
    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.lines.iter().find_map(|l| l.restaurant_id)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(id: i64, price_paise: i64, quantity: u32) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            food_item_id: FoodItemId::new(id * 10),
            food_name: format!("Dish {id}"),
            unit_price: Price::inr(Decimal::new(price_paise, 2)),
            quantity,
            image_url: None,
            restaurant_id: None,
        }
    }

    #[test]
    fn test_aggregates_are_computed_from_lines() {
        let cart = Cart::new(vec![line(1, 12_050, 2), line(2, 9_900, 1), line(3, 1, 5)]);

        let expected_count: u64 = cart.lines().iter().map(|l| u64::from(l.quantity)).sum();
        let expected_subtotal: Price = cart
            .lines()
            .iter()
            .map(|l| l.unit_price.times(l.quantity))
            .sum();

        assert_eq!(cart.item_count(), expected_count);
        assert_eq!(cart.item_count(), 8);
        assert_eq!(cart.subtotal(), expected_subtotal);
        assert_eq!(cart.subtotal().amount, Decimal::new(34_005, 2));
    }

    #[test]
    fn test_zero_quantity_lines_are_dropped() {
        let cart = Cart::new(vec![line(1, 100, 0), line(2, 100, 1)]);
        assert_eq!(cart.lines().len(), 1);
        assert!(cart.line(CartLineId::new(1)).is_none());
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert!(cart.subtotal().is_zero());
        assert_eq!(cart.restaurant_id(), None);
    }

    #[test]
    fn test_restaurant_id_skips_unknown_lines() {
        let mut second = line(2, 100, 1);
        second.restaurant_id = Some(RestaurantId::new(3));
        let cart = Cart::new(vec![line(1, 100, 1), second]);
        assert_eq!(cart.restaurant_id(), Some(RestaurantId::new(3)));
    }

    #[test]
    fn test_line_for_food() {
        let cart = Cart::new(vec![line(1, 100, 1)]);
        assert_eq!(
            cart.line_for_food(FoodItemId::new(10)).map(|l| l.id),
            Some(CartLineId::new(1))
        );
    }
}
