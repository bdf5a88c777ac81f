//! Restaurant and menu types.

use food_client_core::{FoodItemId, Price, RestaurantId};

/// A restaurant listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub cuisine: Option<String>,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub is_open: bool,
}

/// A food item on a restaurant's menu.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodItem {
    pub id: FoodItemId,
    pub restaurant_id: Option<RestaurantId>,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    pub available: bool,
    pub vegetarian: Option<bool>,
}
