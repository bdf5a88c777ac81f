//! Food client core - shared domain types.
//!
//! This crate provides the types used across the food ordering client:
//! - `food-client` - session, HTTP, cart and order services
//! - `food-client-cli` - the `food` command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O and no
//! HTTP clients, so it can be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices and emails, plus the
//!   role and order/payment status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
