//! Command implementations.
//!
//! Each command prints its result to stdout; logs and errors go to stderr.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
