//! Integration tests for the food client.
//!
//! Tests run the real client stack against [`FakeBackend`], an in-process
//! axum server that mimics the food ordering REST API: enveloped
//! responses, bearer token checks, token refresh, a single cart, and
//! scripted order status sequences.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p food-client-integration-tests
//! ```
//!
//! Every request the backend receives is recorded, so tests can assert on
//! exactly what went over the wire.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use food_client::models::Credentials;
use food_client::{ClientConfig, FoodClient, MemoryStorage, PollPolicy};
use food_client_core::Email;

/// Prefix every backend route lives under.
const API_PREFIX: &str = "/api/v1";

pub const USER_ID: i64 = 7;
pub const EMAIL: &str = "asha@example.in";
pub const PASSWORD: &str = "correct-horse";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// How long a refresh takes, so concurrent 401s pile up behind it.
const REFRESH_DELAY: Duration = Duration::from_millis(100);

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    /// Path below the API prefix, e.g. `/cart/3`.
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Backend {
    requests: Mutex<Vec<Recorded>>,
    /// The one access token currently accepted.
    valid_access: Mutex<Option<String>>,
    token_serial: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_fails: AtomicBool,
    login_override: Mutex<Option<Value>>,
    cart: Mutex<Vec<Value>>,
    /// Extra latency for `GET /cart`, in milliseconds.
    cart_read_delay_ms: AtomicU64,
    next_line_id: AtomicI64,
    order_script: Mutex<VecDeque<Value>>,
    place_override: Mutex<Option<Value>>,
    placed: Mutex<Vec<Value>>,
}

type Shared = Arc<Backend>;

impl Backend {
    async fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) {
        let path = uri.path();
        self.requests.lock().await.push(Recorded {
            method,
            path: path.strip_prefix(API_PREFIX).unwrap_or(path).to_owned(),
            query: uri.query().map(ToOwned::to_owned),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned),
            body: serde_json::from_slice(body).unwrap_or(Value::Null),
        });
    }

    async fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let valid = self.valid_access.lock().await;
        match (presented, valid.as_deref()) {
            (Some(p), Some(v)) if p == v => Ok(()),
            _ => Err(error(StatusCode::UNAUTHORIZED, "Token expired")),
        }
    }

    async fn issue_access(&self) -> String {
        let serial = self.token_serial.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{serial}");
        *self.valid_access.lock().await = Some(token.clone());
        token
    }
}

fn envelope(data: Value) -> Response {
    Json(json!({ "data": data, "timestamp": "2026-10-19T12:00:00" })).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message, "status": status.as_u16() }))).into_response()
}

fn user_json() -> Value {
    json!({ "id": USER_ID, "name": "Asha Rao", "email": EMAIL, "role": "ROLE_CUSTOMER" })
}

/// Menu entry for a food id: name and price.
fn dish(food_item_id: i64) -> (String, f64) {
    match food_item_id {
        42 => ("Paneer Tikka".to_owned(), 249.0),
        43 => ("Masala Dosa".to_owned(), 120.0),
        other => (format!("Dish {other}"), 100.0),
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn login(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Some(raw) = b.login_override.lock().await.clone() {
        return Json(raw).into_response();
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if request["email"] != EMAIL || request["password"] != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    let access = b.issue_access().await;
    envelope(json!({
        "accessToken": access,
        "refreshToken": REFRESH_TOKEN,
        "user": user_json(),
    }))
}

async fn refresh(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    b.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(REFRESH_DELAY).await;

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if b.refresh_fails.load(Ordering::SeqCst) || request["token"] != REFRESH_TOKEN {
        return error(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }

    // Not enveloped: both shapes occur in the wild.
    let access = b.issue_access().await;
    Json(json!({ "accessToken": access })).into_response()
}

async fn profile(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }
    envelope(user_json())
}

async fn get_cart(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }
    let items = b.cart.lock().await.clone();
    let delay = b.cart_read_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    envelope(json!({ "items": items }))
}

async fn add_to_cart(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (Some(food_item_id), Some(quantity)) =
        (request["foodItemId"].as_i64(), request["quantity"].as_i64())
    else {
        return error(StatusCode::BAD_REQUEST, "foodItemId and quantity are required");
    };
    if food_item_id == 999 {
        return error(StatusCode::BAD_REQUEST, "Item is currently unavailable");
    }

    add_line(&b, food_item_id, quantity).await;
    envelope(json!({ "message": "Item added to cart" }))
}

async fn add_line(b: &Backend, food_item_id: i64, quantity: i64) {
    let mut cart = b.cart.lock().await;
    if let Some(line) = cart
        .iter_mut()
        .find(|l| l["foodItem"]["id"].as_i64() == Some(food_item_id))
    {
        let current = line["quantity"].as_i64().unwrap_or(0);
        line["quantity"] = json!(current + quantity);
        return;
    }

    let (name, price) = dish(food_item_id);
    let id = b.next_line_id.fetch_add(1, Ordering::SeqCst) + 1;
    cart.push(json!({
        "id": id,
        "quantity": quantity,
        "foodItem": { "id": food_item_id, "name": name, "price": price, "restaurantId": 3 },
    }));
}

async fn update_cart_line(
    State(b): State<Shared>,
    Path(line_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }

    let Some(quantity) = params.get("quantity").and_then(|q| q.parse::<i64>().ok()) else {
        return error(StatusCode::BAD_REQUEST, "quantity is required");
    };
    let mut cart = b.cart.lock().await;
    match cart.iter_mut().find(|l| l["id"].as_i64() == Some(line_id)) {
        Some(line) => {
            line["quantity"] = json!(quantity);
            envelope(json!({ "message": "Cart updated" }))
        }
        None => error(StatusCode::NOT_FOUND, "Cart item not found"),
    }
}

async fn remove_cart_line(
    State(b): State<Shared>,
    Path(line_id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }
    b.cart
        .lock()
        .await
        .retain(|l| l["id"].as_i64() != Some(line_id));
    StatusCode::NO_CONTENT.into_response()
}

async fn place_order(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    b.placed.lock().await.push(request.clone());
    b.cart.lock().await.clear();

    if let Some(raw) = b.place_override.lock().await.clone() {
        return envelope(raw);
    }

    let online = request["paymentMethod"] == "ONLINE";
    envelope(json!({
        "order": {
            "id": 1001,
            "orderNumber": "FD-1001",
            "status": "PENDING",
            "totalPrice": request["totalPrice"],
            "deliveryAddress": request["deliveryAddress"],
            "paymentMethod": request["paymentMethod"],
            "items": request["items"],
        },
        "paymentUrl": if online { json!("https://pay.example.in/session/1001") } else { Value::Null },
    }))
}

async fn list_orders(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }
    envelope(json!([
        { "id": 1001, "orderNumber": "FD-1001", "status": "DELIVERED", "totalPrice": 260.0 },
        { "id": 1002, "status": "out for delivery", "totalAmount": 410.5 },
        { "status": "PENDING" },
    ]))
}

async fn get_order(
    State(b): State<Shared>,
    Path(order_id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }

    let mut script = b.order_script.lock().await;
    // The last scripted state repeats forever.
    let next = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    match next {
        Some(mut order) => {
            order["id"] = json!(order_id);
            envelope(order)
        }
        None => error(StatusCode::NOT_FOUND, "Order not found"),
    }
}

async fn init_payment(
    State(b): State<Shared>,
    Path(order_id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if let Err(rejection) = b.authorize(&headers).await {
        return rejection;
    }
    envelope(json!({ "paymentUrl": format!("https://pay.example.in/session/{order_id}") }))
}

async fn restaurants(
    State(b): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    envelope(json!({
        "content": [
            { "id": 3, "name": "Spice Route", "cuisine": "North Indian", "rating": 4.4, "isOpen": true },
            { "restaurantId": 4, "restaurantName": "Dosa Corner", "open": false },
        ],
        "totalElements": 2,
    }))
}

async fn restaurant(
    State(b): State<Shared>,
    Path(restaurant_id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    if restaurant_id != 3 {
        return error(StatusCode::NOT_FOUND, "Restaurant not found");
    }
    envelope(json!({ "id": 3, "name": "Spice Route", "address": "12 MG Road, Bengaluru" }))
}

async fn menu(
    State(b): State<Shared>,
    Path(restaurant_id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    let items: Vec<Value> = [42, 43]
        .into_iter()
        .map(|id| {
            let (name, price) = dish(id);
            json!({ "id": id, "name": name, "price": price, "isVeg": true })
        })
        .collect();
    if restaurant_id == 3 {
        envelope(json!(items))
    } else {
        envelope(json!([]))
    }
}

async fn search_foods(
    State(b): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    b.record(method, &uri, &headers, &body).await;
    let needle = params.get("name").map(|n| n.to_lowercase()).unwrap_or_default();
    let hits: Vec<Value> = [42, 43]
        .into_iter()
        .filter_map(|id| {
            let (name, price) = dish(id);
            name.to_lowercase().contains(&needle).then(|| {
                json!({ "foodItemId": id, "foodName": name, "unitPrice": price, "restaurant": { "id": 3 } })
            })
        })
        .collect();
    envelope(json!(hits))
}

fn router(backend: Shared) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/users/user-profile", get(profile))
        .route("/cart", get(get_cart).post(add_to_cart))
        .route("/cart/{id}", put(update_cart_line).delete(remove_cart_line))
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/{id}", get(get_order))
        .route("/payments/init/{id}", post(init_payment))
        .route("/restaurant", get(restaurants))
        .route("/restaurant/{id}", get(restaurant))
        .route("/foods/restaurants/search", get(search_foods))
        .route("/foods/restaurants/{id}", get(menu));

    Router::new().nest(API_PREFIX, api).with_state(backend)
}

// =============================================================================
// FakeBackend
// =============================================================================

/// A running fake backend on an ephemeral local port.
///
/// The server stops when the value is dropped.
pub struct FakeBackend {
    base_url: Url,
    backend: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind to `127.0.0.1:0` and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Failed to read local address");

        let backend = Shared::default();
        let app = router(Arc::clone(&backend));
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake backend stopped unexpectedly");
        });

        let base_url = Url::parse(&format!("http://{addr}{API_PREFIX}"))
            .expect("Failed to build fake backend URL");
        Self {
            base_url,
            backend,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Client configuration pointed at this backend, with fast polling.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::for_api(self.base_url());
        config.http_timeout = Duration::from_secs(5);
        config.order_poll = PollPolicy {
            interval: Duration::from_millis(20),
            max_attempts: 20,
        };
        config.payment_poll = PollPolicy {
            interval: Duration::from_millis(20),
            max_attempts: 3,
        };
        config
    }

    /// A started client over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    pub async fn client_with(&self, storage: Arc<MemoryStorage>) -> FoodClient {
        let client = FoodClient::new(self.config(), storage).expect("Failed to build client");
        client.start().await;
        client
    }

    /// A started, signed-out client with fresh in-memory storage.
    pub async fn client(&self) -> (FoodClient, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (self.client_with(Arc::clone(&storage)).await, storage)
    }

    /// A client signed in as the test user, with the cart load that
    /// follows sign-in already finished.
    ///
    /// # Panics
    ///
    /// Panics if the login fails or the cart is not loaded in time.
    pub async fn signed_in_client(&self) -> (FoodClient, Arc<MemoryStorage>) {
        let (client, storage) = self.client().await;
        let mut cart_updates = client.cart().subscribe();
        client
            .auth()
            .login(&credentials(PASSWORD))
            .await
            .expect("Test user login failed");
        tokio::time::timeout(Duration::from_secs(5), cart_updates.changed())
            .await
            .expect("Cart was not loaded after login")
            .expect("Cart service dropped");
        (client, storage)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<Recorded> {
        self.backend.requests.lock().await.clone()
    }

    /// Requests with the given method and path (below the API prefix).
    pub async fn requests_to(&self, method: &Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method == *method && r.path == path)
            .collect()
    }

    pub async fn clear_requests(&self) {
        self.backend.requests.lock().await.clear();
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.backend.refresh_calls.load(Ordering::SeqCst)
    }

    /// Order bodies received by `POST /orders`.
    pub async fn placed_orders(&self) -> Vec<Value> {
        self.backend.placed.lock().await.clone()
    }

    // =========================================================================
    // Scenario setup
    // =========================================================================

    /// Invalidate the current access token; the next authenticated request
    /// gets a 401.
    pub async fn revoke_access_token(&self) {
        *self.backend.valid_access.lock().await = None;
    }

    /// Make every refresh attempt fail.
    pub fn fail_refresh(&self) {
        self.backend.refresh_fails.store(true, Ordering::SeqCst);
    }

    /// Answer logins with `body` verbatim.
    pub async fn set_login_response(&self, body: Value) {
        *self.backend.login_override.lock().await = Some(body);
    }

    /// Answer order placement with `order` (enveloped).
    pub async fn set_place_order_response(&self, order: Value) {
        *self.backend.place_override.lock().await = Some(order);
    }

    /// Delay every `GET /cart` response by `delay`.
    pub fn delay_cart_reads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.backend.cart_read_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Put a line in the server cart directly.
    pub async fn seed_cart(&self, food_item_id: i64, quantity: i64) {
        add_line(&self.backend, food_item_id, quantity).await;
    }

    /// States returned by successive `GET /orders/{id}` calls; the last one
    /// repeats.
    pub async fn script_order(&self, states: impl IntoIterator<Item = Value>) {
        *self.backend.order_script.lock().await = states.into_iter().collect();
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Credentials for the test user with the given password.
///
/// # Panics
///
/// Panics if the test email constant is invalid.
#[must_use]
pub fn credentials(password: &str) -> Credentials {
    Credentials {
        email: Email::parse(EMAIL).expect("Test email is valid"),
        password: SecretString::from(password.to_owned()),
    }
}

/// An order in `status`, for [`FakeBackend::script_order`].
#[must_use]
pub fn order_state(status: &str) -> Value {
    json!({ "status": status, "totalPrice": 260.0, "paymentMethod": "ONLINE", "paymentStatus": "PENDING" })
}
