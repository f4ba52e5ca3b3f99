//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`
//! and every error reaches the client as a JSON `{ "error": "..." }` body.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use colando_core::checkout::CheckoutError;
use colando_core::coupon::CouponError;
use colando_core::shipping::ShippingError;

use crate::db::RepositoryError;
use crate::melhor_envio::ShippingProviderError;
use crate::stripe::{SignatureError, StripeError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Stripe API operation failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Melhor Envio operation failed.
    #[error("Shipping provider error: {0}")]
    ShippingProvider(#[from] ShippingProviderError),

    /// Checkout payload was not acceptable.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Coupon code or definition was not acceptable.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Shipping quote input was malformed.
    #[error(transparent)]
    Shipping(#[from] ShippingError),

    /// Webhook delivery could not be authenticated.
    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with the resource's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            // Stripe refusing the session is reported to the client as a 400
            Self::Stripe(StripeError::Rejected(_) | StripeError::InvalidAmount(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Stripe(_) | Self::ShippingProvider(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(CheckoutError::InFlight) => StatusCode::CONFLICT,
            Self::Checkout(CheckoutError::Backend(_)) => StatusCode::BAD_GATEWAY,
            Self::Coupon(CouponError::Lookup(_)) => StatusCode::BAD_GATEWAY,
            Self::Checkout(_)
            | Self::Coupon(_)
            | Self::Shipping(_)
            | Self::Signature(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Don't expose internal error details to clients
    fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Stripe(StripeError::Rejected(msg)) => msg.clone(),
            Self::Stripe(StripeError::InvalidAmount(name)) => format!("Invalid price for {name}"),
            Self::Stripe(_) => "Payment service error".to_string(),
            Self::ShippingProvider(_) => "Shipping service error".to_string(),
            Self::Coupon(CouponError::Lookup(_)) => "Coupon service error".to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Coupon(err) => err.to_string(),
            Self::Shipping(err) => err.to_string(),
            Self::Signature(_) => "Invalid signature".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a storefront action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Session created", Some(&[("session_id", "cs_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
