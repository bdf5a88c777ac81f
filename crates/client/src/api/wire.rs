//! Wire formats and normalization.
//!
//! The backend is loose about field names and types. Prices arrive as
//! numbers or strings under several names, images as a string or a list,
//! and collections either bare or wrapped in a page object. Everything is
//! normalized here into the domain models so nothing past this module sees
//! raw JSON.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use food_client_core::{
    CartLineId, Email, FoodItemId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price,
    RestaurantId, Role, UserId,
};

use crate::models::{
    Cart, CartLine, FoodItem, Order, OrderItem, OrderTimestamps, PlacedOrder, Restaurant,
    UserProfile,
};
use crate::session::TokenPair;

/// Keys under which paged endpoints nest their element list.
const LIST_KEYS: &[&str] = &["content", "items", "data", "results"];

fn malformed(what: &str) -> serde_json::Error {
    serde_json::Error::custom(what)
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupBody<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct OtpBody<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshBody<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartBody {
    pub food_item_id: FoodItemId,
    pub quantity: u32,
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemBody {
    pub food_item_id: FoodItemId,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    pub restaurant_id: Option<RestaurantId>,
    pub items: Vec<OrderItemBody>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub delivery_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
}

// =============================================================================
// Field access
// =============================================================================

/// Read-only view over a JSON object with lenient typed getters.
///
/// Every getter takes a list of candidate keys and uses the first one that
/// is present and not null.
#[derive(Clone, Copy)]
struct Obj<'a>(&'a Map<String, Value>);

impl<'a> Obj<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        value.as_object().map(Self)
    }

    fn get(self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }

    fn has(self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn obj(self, keys: &[&str]) -> Option<Self> {
        self.get(keys).and_then(Self::of)
    }

    fn i64(self, keys: &[&str]) -> Option<i64> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(i64_of)
    }

    fn string(self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(string_of)
    }

    fn decimal(self, keys: &[&str]) -> Option<Decimal> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(decimal_of)
    }

    fn bool(self, keys: &[&str]) -> Option<bool> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(bool_of)
    }

    fn f64(self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
    }

    fn image(self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(|v| match v {
                Value::Array(items) => items.iter().find_map(string_of),
                other => string_of(other),
            })
    }

    fn datetime(self, keys: &[&str]) -> Option<NaiveDateTime> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find_map(datetime_of)
    }
}

fn i64_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn bool_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Quantities are clamped into `u32`; negatives become 0.
#[allow(clippy::cast_possible_truncation)]
fn quantity_of(value: Option<&Value>) -> u32 {
    value
        .and_then(|v| i64_of(v).or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .map_or(0, |q| u32::try_from(q.max(0)).unwrap_or(u32::MAX))
}

/// Timestamps come as ISO strings (with or without offset) or as
/// `[year, month, day, hour, minute, second, nanos]` arrays.
fn datetime_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()))
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
        }
        Value::Array(parts) => {
            let part = |i: usize| parts.get(i).and_then(Value::as_i64).unwrap_or(0);
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(part(0)).ok()?,
                u32::try_from(part(1)).ok()?,
                u32::try_from(part(2)).ok()?,
            )?;
            date.and_hms_nano_opt(
                u32::try_from(part(3)).ok()?,
                u32::try_from(part(4)).ok()?,
                u32::try_from(part(5)).ok()?,
                u32::try_from(part(6)).ok()?,
            )
        }
        _ => None,
    }
}

// =============================================================================
// Collections and acknowledgments
// =============================================================================

/// The element list of a collection response.
///
/// Accepts a bare array, a page object wrapping one, or null.
pub fn list_items(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Human-readable message in an acknowledgment body.
pub fn ack_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        other => Obj::of(other).and_then(|o| o.string(&["message", "msg", "status"])),
    }
}

// =============================================================================
// Auth
// =============================================================================

/// Everything an auth response may carry.
#[derive(Debug, Default)]
pub struct AuthPayload {
    pub tokens: Option<TokenPair>,
    pub user: Option<UserProfile>,
    /// True when an `accessToken` key was present, even if unusable.
    pub has_token_field: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokens {
    #[serde(default)]
    access_token: Option<Value>,
    #[serde(default)]
    refresh_token: Option<Value>,
}

/// Parse a login, OTP or refresh response.
///
/// The user record is either the remaining top-level fields or a nested
/// `user` object; a nested `data` object is searched when the top level has
/// no token.
///
/// # Errors
///
/// Returns an error when the body is not a JSON object.
pub fn parse_auth(value: &Value) -> Result<AuthPayload, serde_json::Error> {
    let obj = Obj::of(value).ok_or_else(|| malformed("auth response is not an object"))?;
    if !obj.has("accessToken")
        && let Some(inner) = obj.get(&["data"])
        && inner.is_object()
    {
        return parse_auth(inner);
    }

    let raw = RawTokens::deserialize(value)?;
    let access = raw.access_token.as_ref().and_then(string_of);
    let refresh = raw.refresh_token.as_ref().and_then(string_of);
    let tokens = TokenPair::from_raw(access.as_deref(), refresh.as_deref());

    let user = obj
        .obj(&["user", "userDetails", "profile"])
        .unwrap_or(obj);

    Ok(AuthPayload {
        tokens,
        user: user_profile(user),
        has_token_field: obj.has("accessToken"),
    })
}

/// Parse a token refresh response.
///
/// # Errors
///
/// Returns an error when the body carries no usable access token.
pub fn parse_refresh(value: &Value) -> Result<TokenPair, serde_json::Error> {
    parse_auth(value)?
        .tokens
        .ok_or_else(|| malformed("refresh response has no access token"))
}

/// Parse a profile response.
///
/// # Errors
///
/// Returns an error when the body has no user id.
pub fn parse_profile(value: &Value) -> Result<UserProfile, serde_json::Error> {
    Obj::of(value)
        .and_then(|o| user_profile(o.obj(&["user"]).unwrap_or(o)))
        .ok_or_else(|| malformed("profile response has no user id"))
}

fn user_profile(obj: Obj<'_>) -> Option<UserProfile> {
    let id = obj.i64(&["id", "userId"])?;
    let email = obj
        .string(&["email"])
        .and_then(|raw| Email::parse(&raw).ok());
    let display_name = obj
        .string(&["name", "fullName", "displayName", "username"])
        .or_else(|| email.as_ref().map(|e| local_part(e.as_str()).to_owned()))
        .unwrap_or_default();

    Some(UserProfile {
        id: UserId::new(id),
        display_name,
        email,
        phone: obj.string(&["phone", "phoneNumber", "mobile"]),
        roles: roles(obj),
    })
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Roles from a `role` string and/or a `roles` array of strings or
/// `{name}` / `{authority}` objects. Unknown roles are skipped.
fn roles(obj: Obj<'_>) -> BTreeSet<Role> {
    let mut names = Vec::new();
    if let Some(role) = obj.get(&["role"]) {
        names.push(role);
    }
    if let Some(Value::Array(list)) = obj.get(&["roles", "authorities"]) {
        names.extend(list);
    }

    names
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(_) => Obj::of(v).and_then(|o| o.string(&["name", "authority", "role"])),
            other => string_of(other),
        })
        .filter_map(|name| {
            name.parse::<Role>()
                .inspect_err(|_| warn!(role = %name, "ignoring unknown role"))
                .ok()
        })
        .collect()
}

// =============================================================================
// Catalog
// =============================================================================

fn restaurant(value: &Value) -> Option<Restaurant> {
    let obj = Obj::of(value)?;
    Some(Restaurant {
        id: RestaurantId::new(obj.i64(&["id", "restaurantId"])?),
        name: obj.string(&["name", "restaurantName"]).unwrap_or_default(),
        cuisine: obj.string(&["cuisine", "category", "cuisineType"]),
        address: obj
            .string(&["address", "location"])
            .or_else(|| obj.obj(&["address"]).and_then(|a| a.string(&["street", "city"]))),
        image_url: obj.image(&["imageUrl", "image", "img", "images"]),
        rating: obj.f64(&["rating", "averageRating"]),
        is_open: obj.bool(&["isOpen", "open", "active"]).unwrap_or(true),
    })
}

fn food_item(value: &Value) -> Option<FoodItem> {
    let obj = Obj::of(value)?;
    let restaurant_id = obj
        .i64(&["restaurantId"])
        .or_else(|| obj.obj(&["restaurant"]).and_then(|r| r.i64(&["id"])))
        .map(RestaurantId::new);

    Some(FoodItem {
        id: FoodItemId::new(obj.i64(&["id", "foodItemId", "foodId"])?),
        restaurant_id,
        name: obj.string(&["name", "foodName"]).unwrap_or_default(),
        description: obj.string(&["description"]),
        price: Price::inr(obj.decimal(&["price", "unitPrice"]).unwrap_or_default()),
        image_url: obj.image(&["imageUrl", "image", "img", "images"]),
        available: obj.bool(&["available", "isAvailable"]).unwrap_or(true),
        vegetarian: obj.bool(&["vegetarian", "isVeg", "veg"]),
    })
}

/// Parse a list of restaurants, skipping entries without an id.
pub fn parse_restaurants(value: &Value) -> Vec<Restaurant> {
    list_items(value).into_iter().filter_map(restaurant).collect()
}

/// Parse a single restaurant.
///
/// # Errors
///
/// Returns an error when the body has no restaurant id.
pub fn parse_restaurant(value: &Value) -> Result<Restaurant, serde_json::Error> {
    restaurant(value).ok_or_else(|| malformed("restaurant has no id"))
}

/// Parse a list of food items, skipping entries without an id.
pub fn parse_foods(value: &Value) -> Vec<FoodItem> {
    list_items(value).into_iter().filter_map(food_item).collect()
}

// =============================================================================
// Cart
// =============================================================================

/// Parse a cart response.
///
/// `null`, `[]`, `{}` and an object without an item list all mean an
/// empty cart. Lines without an id or food id are dropped, as are lines
/// whose quantity is zero.
pub fn parse_cart(value: &Value) -> Cart {
    let lines = match value {
        Value::Object(map) => ["items", "cartItems", "content"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        other => list_items(other),
    };

    Cart::new(lines.into_iter().filter_map(cart_line).collect())
}

fn cart_line(value: &Value) -> Option<CartLine> {
    let obj = Obj::of(value)?;
    let food = obj.obj(&["foodItem", "food"]);

    let food_item_id = obj
        .i64(&["foodItemId", "foodId"])
        .or_else(|| food.and_then(|f| f.i64(&["id"])));
    let Some(food_item_id) = food_item_id else {
        warn!("dropping cart line without a food item id");
        return None;
    };

    // Price precedence: line unit price, then the food's price, then a bare
    // line price.
    let unit_price = obj
        .decimal(&["unitPrice"])
        .or_else(|| food.and_then(|f| f.decimal(&["price", "unitPrice"])))
        .or_else(|| obj.decimal(&["price"]))
        .unwrap_or_default();

    let restaurant_id = obj
        .i64(&["restaurantId"])
        .or_else(|| food.and_then(|f| f.i64(&["restaurantId"])))
        .or_else(|| {
            food.and_then(|f| f.obj(&["restaurant"]))
                .and_then(|r| r.i64(&["id"]))
        })
        .map(RestaurantId::new);

    Some(CartLine {
        id: CartLineId::new(obj.i64(&["id", "cartId", "cartItemId"])?),
        food_item_id: FoodItemId::new(food_item_id),
        food_name: obj
            .string(&["foodName", "name"])
            .or_else(|| food.and_then(|f| f.string(&["name"])))
            .unwrap_or_default(),
        unit_price: Price::inr(unit_price),
        quantity: quantity_of(obj.get(&["quantity", "qty"])),
        image_url: obj
            .image(&["imageUrl", "image", "img"])
            .or_else(|| food.and_then(|f| f.image(&["imageUrl", "image", "img", "images"]))),
        restaurant_id,
    })
}

// =============================================================================
// Orders
// =============================================================================

fn order_status(obj: Obj<'_>) -> OrderStatus {
    obj.string(&["status", "orderStatus"])
        .map_or(OrderStatus::Pending, |s| {
            let wire = s.to_ascii_uppercase().replace([' ', '-'], "_");
            serde_json::from_value(Value::String(wire)).unwrap_or(OrderStatus::Unknown)
        })
}

fn payment_status(obj: Obj<'_>) -> Option<PaymentStatus> {
    obj.string(&["paymentStatus"]).map(|s| {
        serde_json::from_value(Value::String(s.to_ascii_uppercase()))
            .unwrap_or(PaymentStatus::Unknown)
    })
}

fn order_item(value: &Value) -> Option<OrderItem> {
    let obj = Obj::of(value)?;
    let food = obj.obj(&["foodItem", "food"]);
    let food_item_id = obj
        .i64(&["foodItemId", "foodId"])
        .or_else(|| food.and_then(|f| f.i64(&["id"])))?;

    Some(OrderItem {
        food_item_id: FoodItemId::new(food_item_id),
        food_name: obj
            .string(&["foodName", "name"])
            .or_else(|| food.and_then(|f| f.string(&["name"]))),
        quantity: quantity_of(obj.get(&["quantity", "qty"])),
        unit_price: Price::inr(
            obj.decimal(&["unitPrice", "price"])
                .or_else(|| food.and_then(|f| f.decimal(&["price"])))
                .unwrap_or_default(),
        ),
    })
}

fn order(obj: Obj<'_>) -> Option<Order> {
    let items = obj
        .get(&["orderItems", "items"])
        .map(list_items)
        .unwrap_or_default()
        .into_iter()
        .filter_map(order_item)
        .collect();

    let restaurant_id = obj
        .i64(&["restaurantId"])
        .or_else(|| obj.obj(&["restaurant"]).and_then(|r| r.i64(&["id"])))
        .map(RestaurantId::new);

    Some(Order {
        id: OrderId::new(obj.i64(&["id", "orderId"])?),
        order_number: obj.string(&["orderNumber"]),
        restaurant_id,
        status: order_status(obj),
        items,
        delivery_address: obj.string(&["deliveryAddress", "address"]).unwrap_or_default(),
        payment_method: obj
            .string(&["paymentMethod"])
            .and_then(|m| m.parse().ok()),
        payment_status: payment_status(obj),
        paid: obj.bool(&["paid", "isPaid"]).unwrap_or(false),
        total_price: Price::inr(
            obj.decimal(&["totalPrice", "totalAmount", "total"])
                .unwrap_or_default(),
        ),
        timestamps: OrderTimestamps {
            placed_at: obj.datetime(&["orderDate", "createdAt", "placedAt"]),
            confirmed_at: obj.datetime(&["confirmedAt"]),
            preparing_at: obj.datetime(&["preparingAt"]),
            ready_at: obj.datetime(&["readyAt"]),
            out_for_delivery_at: obj.datetime(&["outForDeliveryAt"]),
            delivered_at: obj.datetime(&["deliveredAt"]),
            cancelled_at: obj.datetime(&["cancelledAt"]),
        },
    })
}

/// Parse a single order.
///
/// # Errors
///
/// Returns an error when the body has no order id.
pub fn parse_order(value: &Value) -> Result<Order, serde_json::Error> {
    Obj::of(value)
        .and_then(order)
        .ok_or_else(|| malformed("order has no id"))
}

/// Parse the current user's order list, skipping entries without an id.
pub fn parse_orders(value: &Value) -> Vec<Order> {
    list_items(value)
        .into_iter()
        .filter_map(|v| Obj::of(v).and_then(order))
        .collect()
}

/// Parse the response to placing an order.
///
/// The order is either the top-level object or nested under `order`; the
/// payment URL may sit at either level.
///
/// # Errors
///
/// Returns an error when no order id can be found.
pub fn parse_placed_order(value: &Value) -> Result<PlacedOrder, serde_json::Error> {
    let top = Obj::of(value).ok_or_else(|| malformed("order response is not an object"))?;
    let nested = top.obj(&["order"]);
    let order = nested
        .or(Some(top))
        .and_then(order)
        .ok_or_else(|| malformed("order response has no order id"))?;

    let payment_url = payment_url(value).or_else(|| nested.and_then(payment_url_in));
    Ok(PlacedOrder { order, payment_url })
}

/// The hosted payment URL in a payment-initiation or order response.
pub fn payment_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.starts_with("http") => Some(s.trim().to_owned()),
        other => Obj::of(other).and_then(payment_url_in),
    }
}

fn payment_url_in(obj: Obj<'_>) -> Option<String> {
    obj.string(&["paymentUrl", "url", "checkoutUrl", "redirectUrl", "paymentLink"])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn inr(cents: i64) -> Price {
        Price::inr(Decimal::new(cents, 2))
    }

    #[test]
    fn test_cart_empty_shapes() {
        for body in [json!(null), json!([]), json!({}), json!({ "items": null })] {
            assert!(parse_cart(&body).is_empty(), "{body} should be empty");
        }
    }

    #[test]
    fn test_cart_price_precedence() {
        let body = json!({
            "items": [
                { "id": 1, "quantity": 2, "unitPrice": 120, "foodItem": { "id": 10, "price": 999 } },
                { "id": 2, "quantity": 1, "foodItem": { "id": 20, "name": "Dosa", "price": "85.50" } },
                { "id": 3, "quantity": 3, "foodItemId": 30, "price": 40 }
            ]
        });
        let cart = parse_cart(&body);

        let prices: Vec<_> = cart.lines().iter().map(|l| l.unit_price).collect();
        assert_eq!(prices, vec![inr(12_000), inr(8_550), inr(4_000)]);
        assert_eq!(cart.lines()[1].food_name, "Dosa");
        assert_eq!(cart.subtotal(), inr(24_000 + 8_550 + 12_000));
    }

    #[test]
    fn test_cart_drops_unusable_lines() {
        let body = json!([
            { "id": 1, "quantity": 0, "foodItemId": 10, "price": 50 },
            { "id": 2, "quantity": 1, "price": 50 },
            { "quantity": 1, "foodItemId": 30, "price": 50 },
            { "id": 4, "quantity": "2", "foodItemId": 40, "price": 50 }
        ]);
        let cart = parse_cart(&body);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_cart_image_and_restaurant_from_food() {
        let body = json!({ "items": [{
            "id": 1, "quantity": 1,
            "foodItem": {
                "id": 10, "price": 50,
                "image": ["https://img.example/1.jpg", "https://img.example/2.jpg"],
                "restaurant": { "id": 4 }
            }
        }]});
        let line = parse_cart(&body).lines()[0].clone();
        assert_eq!(line.image_url.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(line.restaurant_id, Some(RestaurantId::new(4)));
    }

    #[test]
    fn test_auth_flat_user_fields() {
        let body = json!({
            "accessToken": "a", "refreshToken": "r",
            "id": 7, "name": "Asha", "email": "asha@example.in", "role": "ROLE_CUSTOMER"
        });
        let payload = parse_auth(&body).unwrap();
        assert!(payload.tokens.is_some());
        let user = payload.user.unwrap();
        assert_eq!(user.id, UserId::new(7));
        assert!(user.has_role(Role::Customer));
    }

    #[test]
    fn test_auth_nested_data_and_user() {
        let body = json!({
            "data": {
                "accessToken": "a",
                "user": { "userId": "9", "email": "ravi@example.in", "roles": ["customer", { "name": "ROLE_ADMIN" }, "CHEF"] }
            }
        });
        let payload = parse_auth(&body).unwrap();
        let user = payload.user.unwrap();
        assert_eq!(user.id, UserId::new(9));
        assert_eq!(user.display_name, "ravi");
        assert_eq!(user.roles, BTreeSet::from([Role::Customer, Role::Admin]));
    }

    #[test]
    fn test_auth_sentinel_token_is_no_token() {
        let body = json!({ "accessToken": "undefined", "id": 1 });
        let payload = parse_auth(&body).unwrap();
        assert!(payload.tokens.is_none());
        assert!(payload.has_token_field);
    }

    #[test]
    fn test_auth_without_token_field() {
        let body = json!({ "message": "ok", "user": { "id": 1 } });
        let payload = parse_auth(&body).unwrap();
        assert!(payload.tokens.is_none());
        assert!(!payload.has_token_field);
        assert_eq!(payload.user.unwrap().id, UserId::new(1));
    }

    #[test]
    fn test_order_normalization() {
        let body = json!({
            "id": 11,
            "status": "out_for_delivery",
            "orderItems": [{ "foodItem": { "id": 3, "name": "Idli", "price": 30 }, "quantity": 2 }],
            "totalPrice": 110.5,
            "paymentMethod": "ONLINE",
            "paymentStatus": "paid",
            "orderDate": "2024-05-01T10:00:00",
            "outForDeliveryAt": [2024, 5, 1, 10, 40, 0]
        });
        let order = parse_order(&body).unwrap();

        assert_eq!(order.status, OrderStatus::OutForDelivery);
        assert_eq!(order.items[0].unit_price, inr(3_000));
        assert_eq!(order.total_price, inr(11_050));
        assert_eq!(order.payment_method, Some(PaymentMethod::Online));
        assert!(order.is_paid());
        assert_eq!(
            order.last_updated().unwrap().to_string(),
            "2024-05-01 10:40:00"
        );
    }

    #[test]
    fn test_order_unknown_status_is_preserved_as_unknown() {
        let order = parse_order(&json!({ "id": 1, "status": "REFUND_REQUESTED" })).unwrap();
        assert_eq!(order.status, OrderStatus::Unknown);
        assert!(parse_order(&json!({ "status": "PENDING" })).is_err());
    }

    #[test]
    fn test_placed_order_with_nested_order() {
        let body = json!({ "order": { "id": 5 }, "paymentUrl": "https://pay.example/5" });
        let placed = parse_placed_order(&body).unwrap();
        assert_eq!(placed.order.id, OrderId::new(5));
        assert_eq!(placed.payment_url.as_deref(), Some("https://pay.example/5"));
    }

    #[test]
    fn test_lists_bare_or_paged() {
        let bare = json!([{ "id": 1, "name": "Saravana" }]);
        let paged = json!({ "content": [{ "id": 1, "name": "Saravana" }], "totalPages": 1 });
        assert_eq!(parse_restaurants(&bare), parse_restaurants(&paged));
        assert_eq!(parse_restaurants(&json!(null)), vec![]);
    }

    #[test]
    fn test_food_price_as_string() {
        let foods = parse_foods(&json!([{ "id": 2, "name": "Vada", "price": "25", "isAvailable": false }]));
        assert_eq!(foods[0].price, inr(2_500));
        assert!(!foods[0].available);
    }

    #[test]
    fn test_order_body_uses_numbers_for_money() {
        let body = PlaceOrderBody {
            restaurant_id: Some(RestaurantId::new(4)),
            items: vec![OrderItemBody {
                food_item_id: FoodItemId::new(3),
                quantity: 2,
                price: Decimal::new(3_000, 2),
            }],
            total_price: Decimal::new(11_050, 2),
            delivery_address: "12 MG Road".to_string(),
            notes: None,
            payment_method: PaymentMethod::CashOnDelivery,
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["totalPrice"], json!(110.5));
        assert_eq!(json["items"][0]["foodItemId"], json!(3));
        assert_eq!(json["paymentMethod"], json!("COD"));
        assert!(json.get("notes").is_none());
    }
}
