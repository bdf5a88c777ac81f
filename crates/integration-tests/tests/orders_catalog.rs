//! Order polling, payment confirmation and catalog browsing against the
//! fake backend.
//!
//! Run with: cargo test -p food-client-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use axum::http::Method;
use serde_json::json;

use food_client::{PaymentVerification, PollOutcome};
use food_client_core::{OrderId, OrderStatus, RestaurantId};
use food_client_integration_tests::{FakeBackend, order_state};

const ORDER: i64 = 1001;

async fn order_fetches(backend: &FakeBackend) -> usize {
    backend
        .requests_to(&Method::GET, &format!("/orders/{ORDER}"))
        .await
        .len()
}

// ============================================================================
// Order tracking
// ============================================================================

#[tokio::test]
async fn test_tracking_stops_at_delivered() {
    let backend = FakeBackend::start().await;
    backend
        .script_order([
            order_state("PENDING"),
            order_state("PREPARING"),
            order_state("OUT_FOR_DELIVERY"),
            order_state("DELIVERED"),
        ])
        .await;
    let (client, _storage) = backend.signed_in_client().await;

    let handle = client.track_order(OrderId::new(ORDER));
    let updates = handle.updates();
    let outcome = handle.outcome().await;

    let PollOutcome::Terminal(order) = outcome else {
        panic!("expected a terminal outcome, got {outcome:?}");
    };
    assert_eq!(order.id, OrderId::new(ORDER));
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(
        updates.borrow().as_ref().map(|o| o.status),
        Some(OrderStatus::Delivered)
    );

    assert_eq!(order_fetches(&backend).await, 4);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(order_fetches(&backend).await, 4);
}

#[tokio::test]
async fn test_cancelled_order_is_terminal() {
    let backend = FakeBackend::start().await;
    backend
        .script_order([order_state("CONFIRMED"), order_state("CANCELLED")])
        .await;
    let (client, _storage) = backend.signed_in_client().await;

    let outcome = client.track_order(OrderId::new(ORDER)).outcome().await;

    assert!(matches!(outcome, PollOutcome::Terminal(ref o) if o.status == OrderStatus::Cancelled));
}

#[tokio::test]
async fn test_missing_order_exhausts_attempts() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.signed_in_client().await;

    let outcome = client.track_order(OrderId::new(ORDER)).outcome().await;

    assert_eq!(
        outcome,
        PollOutcome::Exhausted {
            attempts: 20,
            last: None
        }
    );
    assert_eq!(order_fetches(&backend).await, 20);
}

#[tokio::test]
async fn test_dropping_handle_stops_polling() {
    let backend = FakeBackend::start().await;
    backend.script_order([order_state("PREPARING")]).await;
    let (client, _storage) = backend.signed_in_client().await;

    let handle = client.track_order(OrderId::new(ORDER));
    tokio::time::sleep(Duration::from_millis(70)).await;
    drop(handle);

    // Let any request already on the wire land.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let seen = order_fetches(&backend).await;
    assert!(seen >= 1);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(order_fetches(&backend).await, seen);
}

#[tokio::test]
async fn test_expired_session_stops_tracking() {
    let backend = FakeBackend::start().await;
    backend.script_order([order_state("PENDING")]).await;
    let (client, _storage) = backend.signed_in_client().await;
    backend.fail_refresh();
    backend.revoke_access_token().await;

    let outcome = client.track_order(OrderId::new(ORDER)).outcome().await;

    assert_eq!(outcome, PollOutcome::AuthExpired { attempts: 1 });
    assert!(!client.session().is_authenticated().await);
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn test_payment_confirmed_when_paid() {
    let backend = FakeBackend::start().await;
    backend
        .script_order([
            order_state("PENDING"),
            json!({ "status": "CONFIRMED", "paymentStatus": "PAID", "totalPrice": 260.0 }),
        ])
        .await;
    let (client, _storage) = backend.signed_in_client().await;

    let verification = client.verify_payment(OrderId::new(ORDER)).await;

    let PaymentVerification::Confirmed(order) = verification else {
        panic!("expected confirmation, got {verification:?}");
    };
    assert!(order.is_paid());
    assert_eq!(order_fetches(&backend).await, 2);
}

#[tokio::test]
async fn test_payment_verification_gives_up() {
    let backend = FakeBackend::start().await;
    backend.script_order([order_state("PENDING")]).await;
    let (client, _storage) = backend.signed_in_client().await;

    let verification = client.verify_payment(OrderId::new(ORDER)).await;

    assert_eq!(verification, PaymentVerification::Failed { attempts: 3 });
    assert_eq!(order_fetches(&backend).await, 3);
}

#[tokio::test]
async fn test_initiate_payment_returns_url() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.signed_in_client().await;

    let url = client
        .orders()
        .initiate_payment(OrderId::new(ORDER))
        .await
        .unwrap();

    assert_eq!(url, "https://pay.example.in/session/1001");
    assert_eq!(
        backend
            .requests_to(&Method::POST, "/payments/init/1001")
            .await
            .len(),
        1
    );
}

// ============================================================================
// Order history
// ============================================================================

#[tokio::test]
async fn test_order_list_normalizes_entries() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.signed_in_client().await;

    let orders = client.orders().list().await.unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].reference(), "FD-1001");
    assert_eq!(orders[0].status, OrderStatus::Delivered);
    assert_eq!(orders[1].reference(), "1002");
    assert_eq!(orders[1].status, OrderStatus::OutForDelivery);
    assert_eq!(orders[1].total_price.to_string(), "₹410.5");
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_restaurants_are_cached() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.client().await;

    let first = client.catalog().restaurants().await.unwrap();
    let second = client.catalog().restaurants().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].name, "Spice Route");
    assert!(first[0].is_open);
    assert_eq!(first[1].id, RestaurantId::new(4));
    assert!(!first[1].is_open);
    assert_eq!(backend.requests_to(&Method::GET, "/restaurant").await.len(), 1);

    client.catalog().invalidate().await;
    client.catalog().restaurants().await.unwrap();
    assert_eq!(backend.requests_to(&Method::GET, "/restaurant").await.len(), 2);
}

#[tokio::test]
async fn test_menu_items_know_their_restaurant() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.client().await;

    let menu = client.catalog().menu(RestaurantId::new(3)).await.unwrap();

    assert_eq!(menu.len(), 2);
    assert!(
        menu.iter()
            .all(|item| item.restaurant_id == Some(RestaurantId::new(3)))
    );
    assert_eq!(menu[0].vegetarian, Some(true));
}

#[tokio::test]
async fn test_unknown_restaurant_is_not_found() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.client().await;

    let err = client
        .catalog()
        .restaurant(RestaurantId::new(99))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.server_message(), Some("Restaurant not found"));
}

#[tokio::test]
async fn test_search_sends_name_and_skips_blank_queries() {
    let backend = FakeBackend::start().await;
    let (client, _storage) = backend.client().await;

    assert!(client.catalog().search_foods("  ").await.unwrap().is_empty());
    assert!(backend.requests().await.is_empty());

    let hits = client.catalog().search_foods("dosa").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Masala Dosa");
    assert_eq!(hits[0].restaurant_id, Some(RestaurantId::new(3)));

    let search = &backend
        .requests_to(&Method::GET, "/foods/restaurants/search")
        .await[0];
    assert_eq!(search.query.as_deref(), Some("name=dosa"));
}
