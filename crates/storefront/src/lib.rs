//! Colando Storefront library.
//!
//! The HTTP backend behind the storefront: Stripe checkout sessions and
//! webhooks, Melhor Envio shipping quotes, catalog/coupon/draft-order reads,
//! and customers' wishlists and order history. Built as a library so the CLI and the integration tests can reuse
//! the repositories and the router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod melhor_envio;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
