//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (database)
//!
//! # Checkout
//! POST /api/checkout/session        - Open a Stripe checkout session
//! POST /api/stripe/webhook          - Stripe events (signed)
//!
//! # Storefront data
//! POST /api/shipping/quote          - Melhor Envio carrier options
//! GET  /api/coupons/{code}          - Coupon record
//! GET  /api/products                - Product listing (?category_id, ?q)
//! GET  /api/products/{id}           - Product detail
//! POST /api/draft-orders            - Create a customization order
//! GET  /api/draft-orders/{id}       - Draft order with its product
//!
//! # Customer account
//! GET    /api/orders?user_id=                        - Order history
//! GET    /api/orders/{id}                            - Order with its items
//! GET    /api/users/{id}/wishlist                    - Saved products
//! POST   /api/users/{id}/wishlist                    - Save a product
//! DELETE /api/users/{id}/wishlist/{product_id}       - Forget a product
//! ```

pub mod checkout;
pub mod coupons;
pub mod draft_orders;
pub mod extract;
pub mod health;
pub mod orders;
pub mod products;
pub mod shipping;
pub mod webhook;
pub mod wishlist;

use axum::{
    Router,
    http::Request,
    middleware::from_fn,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{cors_layer, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the draft order routes router.
pub fn draft_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(draft_orders::create))
        .route("/{id}", get(draft_orders::show))
}

/// Create the order history routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index).post(wishlist::add))
        .route("/{product_id}", delete(wishlist::remove))
}

/// Create all API routes for the storefront.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/session", post(checkout::create_session))
        .route("/stripe/webhook", post(webhook::receive))
        .route("/shipping/quote", post(shipping::quote))
        .route("/coupons/{code}", get(coupons::show))
        .nest("/products", product_routes())
        .nest("/draft-orders", draft_order_routes())
        .nest("/orders", order_routes())
        .nest("/users/{user_id}/wishlist", wishlist_routes())
}

/// Build the complete application with middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_origins);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
