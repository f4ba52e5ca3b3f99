//! Colando Core - Shared domain types and pricing logic.
//!
//! This crate provides the types and pure logic used across all Colando components:
//! - `storefront` - HTTP backend (checkout sessions, webhooks, shipping quotes)
//! - `cli` - Migrations, back-office commands and the terminal shopping client
//!
//! # Architecture
//!
//! The core crate performs no I/O of its own. Anything that needs the network or
//! a disk (coupon lookup, checkout-session creation, cart persistence) is reached
//! through a trait that the calling crate implements. This keeps every pricing
//! rule unit-testable without a server.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money and status enums
//! - [`cart`] - The cart store and its persistence seam
//! - [`coupon`] - Coupon records, validity checks and discount computation
//! - [`checkout`] - Item resolution and the checkout orchestrator
//! - [`shipping`] - Parcel descriptors and carrier option ranking
//! - [`wishlist`] - A customer's saved products

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod coupon;
pub mod shipping;
pub mod types;
pub mod wishlist;

pub use types::*;
