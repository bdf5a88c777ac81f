//! Domain models.
//!
//! These are the canonical shapes the rest of the client works with. Raw
//! backend payloads are converted into them in [`crate::api::wire`], so no
//! other module has to cope with the backend's field-name variations.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::{Cart, CartLine};
pub use catalog::{FoodItem, Restaurant};
pub use order::{Order, OrderItem, OrderTimestamps, PlacedOrder};
pub use user::{Credentials, ProfileUpdate, SignupRequest, UserProfile};
