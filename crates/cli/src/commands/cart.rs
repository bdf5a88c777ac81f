//! Cart commands.

use food_client::models::Cart;
use food_client::{CartError, FoodClient, Quote};
use food_client_core::{CartLineId, FoodItemId};

pub async fn show(client: &FoodClient) -> Result<(), CartError> {
    if !client.session().is_authenticated().await {
        return Err(CartError::NotAuthenticated);
    }
    let cart = client.cart().load().await?;
    print_cart(&cart);
    Ok(())
}

pub async fn add(client: &FoodClient, food_item_id: FoodItemId, quantity: u32) -> Result<(), CartError> {
    let cart = client.cart().add_item(food_item_id, quantity).await?;
    print_cart(&cart);
    Ok(())
}

pub async fn set(client: &FoodClient, line_id: CartLineId, quantity: i64) -> Result<(), CartError> {
    let cart = client.cart().set_quantity(line_id, quantity).await?;
    print_cart(&cart);
    Ok(())
}

pub async fn remove(client: &FoodClient, line_id: CartLineId) -> Result<(), CartError> {
    let cart = client.cart().remove_item(line_id).await?;
    print_cart(&cart);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty");
        return;
    }

    for line in cart.lines() {
        println!(
            "{:>5}  {} x{}  {}",
            line.id.as_i64(),
            line.food_name,
            line.quantity,
            line.line_total()
        );
    }
    print_quote(&Quote::for_subtotal(cart.subtotal()));
}

/// Print the price breakdown.
#[allow(clippy::print_stdout)]
pub fn print_quote(quote: &Quote) {
    println!();
    println!("  Subtotal      {}", quote.subtotal);
    if quote.delivery_fee.is_zero() {
        println!("  Delivery      FREE");
    } else {
        println!("  Delivery      {}", quote.delivery_fee);
    }
    println!("  Platform fee  {}", quote.platform_fee);
    println!("  Tax (5%)      {}", quote.tax);
    println!("  Total         {}", quote.total);
}
