//! Checkout, order history, tracking and payment commands.

use food_client::models::Order;
use food_client::orders::ProgressTracker;
use food_client::{ApiError, CheckoutRequest, FoodClient, PaymentVerification, PollOutcome};
use food_client_core::{OrderId, OrderStatus, PaymentMethod};

use super::cart::print_quote;

#[allow(clippy::print_stdout)]
pub async fn checkout(
    client: &FoodClient,
    delivery_address: String,
    notes: Option<String>,
    payment_method: PaymentMethod,
    wait: bool,
) -> food_client::Result<()> {
    let request = CheckoutRequest {
        delivery_address,
        notes,
        payment_method,
    };
    let receipt = client.checkout(&request).await?;
    let order_id = receipt.order.id;

    println!("Order {} placed", receipt.order.reference());
    print_quote(&receipt.quote);

    if payment_method != PaymentMethod::Online {
        return Ok(());
    }

    let url = match receipt.payment_url {
        Some(url) => url,
        None => client.orders().initiate_payment(order_id).await?,
    };
    println!();
    println!("Complete your payment at: {url}");

    if wait {
        verify(client, order_id).await;
    } else {
        println!("Then run: food pay verify {order_id}");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn list(client: &FoodClient) -> Result<(), ApiError> {
    let orders = client.orders().list().await?;
    if orders.is_empty() {
        println!("No orders yet");
    }
    for order in &orders {
        let when = order
            .last_updated()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>8}  {:<12}  {:>3} items  {:>10}  {when}",
            order.reference(),
            order.status.label(),
            order.item_count(),
            order.total_price.to_string()
        );
    }
    Ok(())
}

pub async fn show(client: &FoodClient, order_id: OrderId) -> Result<(), ApiError> {
    let order = client.orders().get(order_id).await?;
    print_order(&order);
    Ok(())
}

/// Follow an order until it finishes or the user interrupts.
#[allow(clippy::print_stdout)]
pub async fn track(client: &FoodClient, order_id: OrderId) -> Result<(), ApiError> {
    // Fail fast on an unknown order instead of polling for an hour.
    let order = client.orders().get(order_id).await?;
    let mut tracker = ProgressTracker::new();
    let mut shown = print_progress(&mut tracker, &order, None);
    if order.status.is_terminal() {
        return Ok(());
    }

    let mut handle = client.track_order(order_id);
    let mut updates = handle.updates();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().clone();
                if let Some(order) = latest {
                    shown = print_progress(&mut tracker, &order, shown);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }

    match handle.outcome().await {
        PollOutcome::Terminal(_) | PollOutcome::Cancelled => {}
        PollOutcome::Exhausted { attempts, .. } => {
            println!("Stopped after {attempts} checks; run `food orders track {order_id}` to resume");
        }
        PollOutcome::AuthExpired { .. } => return Err(ApiError::AuthExpired),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn pay(client: &FoodClient, order_id: OrderId) -> Result<(), ApiError> {
    let url = client.orders().initiate_payment(order_id).await?;
    println!("Complete your payment at: {url}");
    println!("Then run: food pay verify {order_id}");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn verify(client: &FoodClient, order_id: OrderId) {
    println!("Waiting for payment confirmation...");
    match client.verify_payment(order_id).await {
        PaymentVerification::Confirmed(order) => {
            client.cart().clear();
            println!("Payment received for order {}", order.reference());
        }
        PaymentVerification::Failed { attempts } => {
            println!(
                "Payment not confirmed after {attempts} checks. \
                 If you were charged, it will show up shortly."
            );
        }
    }
}

/// Print the status line if the displayed step moved; returns what is shown.
#[allow(clippy::print_stdout)]
fn print_progress(
    tracker: &mut ProgressTracker,
    order: &Order,
    shown: Option<OrderStatus>,
) -> Option<OrderStatus> {
    tracker.observe(order.status);
    if tracker.is_cancelled() {
        if shown != Some(OrderStatus::Cancelled) {
            println!("Order {} was cancelled", order.reference());
        }
        return Some(OrderStatus::Cancelled);
    }

    let steps = tracker.steps();
    let Some((index, step)) = steps.iter().enumerate().find(|(_, s)| s.active) else {
        return shown;
    };
    if shown != Some(step.status) {
        println!(
            "[{}/{}] {} - {}",
            index + 1,
            steps.len(),
            step.label,
            step.description
        );
    }
    Some(step.status)
}

#[allow(clippy::print_stdout)]
fn print_order(order: &Order) {
    println!("Order {}  ({})", order.reference(), order.status);
    for item in &order.items {
        let name = item
            .food_name
            .clone()
            .unwrap_or_else(|| format!("Item #{}", item.food_item_id));
        println!("  {name} x{}  {}", item.quantity, item.unit_price.times(item.quantity));
    }
    println!("  Total: {}", order.total_price);
    if !order.delivery_address.is_empty() {
        println!("  Deliver to: {}", order.delivery_address);
    }
    if let Some(method) = order.payment_method {
        let paid = if order.is_paid() { "paid" } else { "unpaid" };
        let method = match method {
            PaymentMethod::CashOnDelivery => "cash on delivery",
            PaymentMethod::Online => "online",
        };
        println!("  Payment: {method} ({paid})");
    }

    let mut tracker = ProgressTracker::new();
    tracker.observe(order.status);
    if tracker.is_cancelled() {
        return;
    }
    for step in tracker.steps() {
        let mark = if step.active {
            ">"
        } else if step.completed {
            "x"
        } else {
            " "
        };
        println!("  [{mark}] {}", step.label);
    }
}
