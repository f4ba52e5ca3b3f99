//! Melhor Envio client for shipping quotes.
//!
//! Authenticates with OAuth client credentials. The access token is cached in
//! `moka` until shortly before it expires; concurrent quotes share one token
//! request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use colando_core::shipping::{CarrierQuote, Parcel, ShippingQuoteRequest};

use crate::config::MelhorEnvioConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this long before the provider says the token expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Used when the token response has no `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Errors from the shipping provider.
#[derive(Debug, Clone, Error)]
pub enum ShippingProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Token request was refused.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ShippingProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
struct CachedToken {
    value: Arc<SecretString>,
    ttl: Duration,
}

struct TokenExpiry;

impl Expiry<(), CachedToken> for TokenExpiry {
    fn expire_after_create(&self, _: &(), token: &CachedToken, _: Instant) -> Option<Duration> {
        Some(token.ttl)
    }
}

#[derive(Debug, Serialize)]
struct PostalCode<'a> {
    postal_code: &'a str,
}

/// Parcel as the calculate endpoint wants it: plain JSON numbers.
#[derive(Debug, Serialize)]
struct ApiParcel {
    #[serde(with = "rust_decimal::serde::float")]
    width: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    height: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    length: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    weight: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    insurance_value: Decimal,
    quantity: u32,
}

impl From<&Parcel> for ApiParcel {
    fn from(p: &Parcel) -> Self {
        Self {
            width: p.width,
            height: p.height,
            length: p.length,
            weight: p.weight,
            insurance_value: p.insurance_value,
            quantity: p.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
struct CalculateRequest<'a> {
    from: PostalCode<'a>,
    to: PostalCode<'a>,
    products: Vec<ApiParcel>,
}

/// Melhor Envio API client.
#[derive(Clone)]
pub struct MelhorEnvioClient {
    inner: Arc<MelhorEnvioInner>,
}

struct MelhorEnvioInner {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    origin_postal_code: String,
    token: Cache<(), CachedToken>,
}

impl MelhorEnvioClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MelhorEnvioConfig) -> Result<Self, ShippingProviderError> {
        Self::with_base_url(config, config.environment.base_url())
    }

    /// Client against a different API host (used by tests).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(
        config: &MelhorEnvioConfig,
        base_url: &str,
    ) -> Result<Self, ShippingProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()?;

        let token = Cache::builder()
            .max_capacity(1)
            .expire_after(TokenExpiry)
            .build();

        Ok(Self {
            inner: Arc::new(MelhorEnvioInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                origin_postal_code: config.origin_postal_code.clone(),
                token,
            }),
        })
    }

    /// Quote a validated request and drop the options carriers could not price.
    ///
    /// # Errors
    ///
    /// Any [`ShippingProviderError`].
    #[instrument(skip(self, request), fields(to = %request.to_postal_code, parcels = request.products.len()))]
    pub async fn quote(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<Vec<CarrierQuote>, ShippingProviderError> {
        let token = self.access_token().await?;

        let body = CalculateRequest {
            from: PostalCode {
                postal_code: &self.inner.origin_postal_code,
            },
            to: PostalCode {
                postal_code: &request.to_postal_code,
            },
            products: request.products.iter().map(ApiParcel::from).collect(),
        };

        let response = self
            .inner
            .client
            .post(format!("{}/api/v2/me/shipment/calculate", self.inner.base_url))
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Token revoked early; the next call fetches a fresh one.
            self.inner.token.invalidate(&()).await;
        }
        if !status.is_success() {
            return Err(ShippingProviderError::Api {
                status: status.as_u16(),
                message: api_message(&text),
            });
        }

        let quotes: Vec<CarrierQuote> =
            serde_json::from_str(&text).map_err(|e| ShippingProviderError::Parse(e.to_string()))?;
        let total = quotes.len();
        let usable = usable_quotes(quotes);
        debug!(total, usable = usable.len(), "Shipping quotes received");
        Ok(usable)
    }

    async fn access_token(&self) -> Result<Arc<SecretString>, ShippingProviderError> {
        let inner = Arc::clone(&self.inner);
        let cached = self
            .inner
            .token
            .try_get_with((), async move { fetch_token(&inner).await })
            .await
            .map_err(|e: Arc<ShippingProviderError>| (*e).clone())?;
        Ok(cached.value)
    }
}

async fn fetch_token(inner: &MelhorEnvioInner) -> Result<CachedToken, ShippingProviderError> {
    let response = inner
        .client
        .post(format!("{}/oauth/token", inner.base_url))
        .json(&TokenRequest {
            client_id: &inner.client_id,
            client_secret: inner.client_secret.expose_secret(),
            grant_type: "client_credentials",
        })
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let message = api_message(&text);
        warn!(status = status.as_u16(), %message, "Melhor Envio token request failed");
        return Err(ShippingProviderError::Auth(message));
    }

    let token: TokenResponse =
        serde_json::from_str(&text).map_err(|e| ShippingProviderError::Parse(e.to_string()))?;
    let ttl = token_ttl(token.expires_in);
    debug!(ttl_secs = ttl.as_secs(), "Melhor Envio token issued");

    Ok(CachedToken {
        value: Arc::new(SecretString::from(token.access_token)),
        ttl,
    })
}

/// Cache lifetime for a token that the provider says lives `expires_in` seconds.
fn token_ttl(expires_in: Option<u64>) -> Duration {
    expires_in.map_or(DEFAULT_TOKEN_TTL, |secs| {
        Duration::from_secs(secs)
            .saturating_sub(TOKEN_EXPIRY_MARGIN)
            .max(Duration::from_secs(1))
    })
}

fn usable_quotes(quotes: Vec<CarrierQuote>) -> Vec<CarrierQuote> {
    quotes.into_iter().filter(|q| q.error.is_none()).collect()
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}
