//! Browsing commands.

use food_client::models::FoodItem;
use food_client::{ApiError, FoodClient};
use food_client_core::RestaurantId;

#[allow(clippy::print_stdout)]
pub async fn restaurants(client: &FoodClient) -> Result<(), ApiError> {
    let restaurants = client.catalog().restaurants().await?;
    if restaurants.is_empty() {
        println!("No restaurants found");
    }
    for r in &restaurants {
        let open = if r.is_open { "open" } else { "closed" };
        let rating = r.rating.map(|v| format!(" {v:.1}*")).unwrap_or_default();
        let cuisine = r.cuisine.as_deref().unwrap_or("");
        println!("{:>5}  {}{rating}  {cuisine}  [{open}]", r.id.as_i64(), r.name);
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn menu(client: &FoodClient, restaurant_id: RestaurantId) -> Result<(), ApiError> {
    let (restaurant, items) = tokio::join!(
        client.catalog().restaurant(restaurant_id),
        client.catalog().menu(restaurant_id),
    );
    let restaurant = restaurant?;
    println!("{}", restaurant.name);
    if let Some(address) = &restaurant.address {
        println!("{address}");
    }
    if !restaurant.is_open {
        println!("(currently closed)");
    }
    println!();
    print_items(&items?);
    Ok(())
}

pub async fn search(client: &FoodClient, name: &str) -> Result<(), ApiError> {
    let items = client.catalog().search_foods(name).await?;
    print_items(&items);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_items(items: &[FoodItem]) {
    if items.is_empty() {
        println!("No dishes found");
    }
    for item in items {
        let veg = match item.vegetarian {
            Some(true) => " (veg)",
            Some(false) => " (non-veg)",
            None => "",
        };
        let unavailable = if item.available { "" } else { "  [unavailable]" };
        println!(
            "{:>5}  {}{veg}  {}{unavailable}",
            item.id.as_i64(),
            item.name,
            item.price
        );
    }
}
