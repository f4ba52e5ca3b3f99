//! Stripe integration: hosted checkout sessions and signed webhooks.
//!
//! Talks to the REST API directly with `reqwest`; requests are
//! form-encoded the way Stripe expects (`line_items[0][quantity]=2`).

mod client;
pub mod webhook;

pub use client::{CheckoutSession, SessionRequest, StripeClient};
pub use webhook::{SignatureError, WebhookEvent, verify_signature};

use thiserror::Error;

/// Errors talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe rejected the request (4xx); the message is Stripe's.
    #[error("Stripe rejected the request: {0}")]
    Rejected(String),

    /// Stripe failed (5xx or unexpected response).
    #[error("Stripe API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// An amount could not be expressed in minor units.
    #[error("Invalid amount for {0}")]
    InvalidAmount(String),

    /// Response did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}
