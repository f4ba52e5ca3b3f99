//! HTTP client for the storefront API.
//!
//! Implements the core crate's `CouponSource` and `CheckoutBackend` seams so
//! the terminal cart runs the same pricing and checkout code as the browser.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use colando_core::checkout::{CheckoutBackend, CheckoutRedirect, CheckoutRequest, DraftOrderView};
use colando_core::coupon::{Coupon, CouponCode, CouponSource};
use colando_core::shipping::{CarrierQuote, ShippingQuoteRequest};
use colando_core::wishlist::WishlistAdd;
use colando_core::{DraftOrderId, OrderId, Product, ProductId, UserId};
use colando_storefront::models::Order;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default storefront address when `COLANDO_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// Errors from the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response; the message is the server's.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Storefront API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the storefront at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("colando-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Fetch a catalog product.
    ///
    /// # Errors
    ///
    /// `Api` with status 404 when the product does not exist.
    pub async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("api/products/{id}"))?)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Fetch a draft order with its product.
    ///
    /// # Errors
    ///
    /// `Api` with status 404 when the draft does not exist.
    pub async fn draft_order(&self, id: DraftOrderId) -> Result<DraftOrderView, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("api/draft-orders/{id}"))?)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Quote shipping for a set of parcels.
    ///
    /// # Errors
    ///
    /// `Api` with status 400 for an invalid CEP, 502 when the carrier
    /// aggregator fails.
    pub async fn quote_shipping(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<Vec<CarrierQuote>, ApiError> {
        let response = self
            .client
            .post(self.url("api/shipping/quote")?)
            .json(request)
            .send()
            .await?;
        parse_json(response).await
    }

    /// A customer's saved products.
    ///
    /// # Errors
    ///
    /// `Api` with status 400 for a malformed user id.
    pub async fn wishlist(&self, user: UserId) -> Result<Vec<Product>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("api/users/{user}/wishlist"))?)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Save a product to a customer's wishlist.
    ///
    /// # Errors
    ///
    /// `Api` with status 404 when the product does not exist.
    pub async fn add_to_wishlist(&self, user: UserId, product: ProductId) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("api/users/{user}/wishlist"))?)
            .json(&WishlistAdd {
                product_id: product,
            })
            .send()
            .await?;
        parse_json::<WishlistAdd>(response).await.map(|_| ())
    }

    /// Remove a product from a customer's wishlist.
    ///
    /// # Errors
    ///
    /// `Api` with status 400 for malformed ids.
    pub async fn remove_from_wishlist(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("api/users/{user}/wishlist/{product}"))?)
            .send()
            .await?;
        expect_success(response).await
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// `Api` with status 400 for a malformed user id.
    pub async fn orders_for(&self, user: UserId) -> Result<Vec<Order>, ApiError> {
        let mut url = self.url("api/orders")?;
        url.query_pairs_mut().append_pair("user_id", &user.to_string());

        let response = self.client.get(url).send().await?;
        parse_json(response).await
    }

    /// One order with its items.
    ///
    /// # Errors
    ///
    /// `Api` with status 404 when the order does not exist.
    pub async fn order(&self, id: OrderId) -> Result<Order, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("api/orders/{id}"))?)
            .send()
            .await?;
        parse_json(response).await
    }
}

impl CouponSource for ApiClient {
    type Error = ApiError;

    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, ApiError> {
        let mut url = self.url("api/coupons/")?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(code.as_str());

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_json(response).await.map(Some)
    }
}

impl CheckoutBackend for ApiClient {
    type Error = ApiError;

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutRedirect, ApiError> {
        let response = self
            .client
            .post(self.url("api/checkout/session")?)
            .json(request)
            .send()
            .await?;
        parse_json(response).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

async fn expect_success(response: reqwest::Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}
