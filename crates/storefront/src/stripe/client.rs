//! Checkout Sessions API client.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use colando_core::checkout::CheckoutLine;
use colando_core::{CurrencyCode, DraftOrderId, Price, UserId};

use super::StripeError;
use crate::config::StripeConfig;

const API_BASE: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Payment methods offered on the hosted page.
const PAYMENT_METHODS: &[&str] = &["card", "pix"];
/// Countries a shipping address may be collected for.
const SHIPPING_COUNTRIES: &[&str] = &["BR"];

/// What to open a checkout session for.
#[derive(Debug, Clone)]
pub struct SessionRequest<'a> {
    pub lines: &'a [CheckoutLine],
    pub user_id: Option<UserId>,
    pub draft_order_id: Option<DraftOrderId>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page URL; Stripe omits it only for embedded sessions.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    currency: CurrencyCode,
}

impl StripeClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        Self::with_base_url(config, API_BASE)
    }

    /// Client against a different API host (used by tests).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(config: &StripeConfig, api_base: &str) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: api_base.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.clone(),
                currency: config.currency,
            }),
        })
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// `Rejected` when Stripe refuses the parameters, `Api`/`Http` on upstream
    /// failures, `InvalidAmount` when a price cannot be converted to cents.
    #[instrument(skip(self, request), fields(lines = request.lines.len(), draft = ?request.draft_order_id))]
    pub async fn create_checkout_session(
        &self,
        request: &SessionRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let form = session_form(request, self.inner.currency)?;

        let response = self
            .inner
            .client
            .post(format!("{}/checkout/sessions", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_client_error() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(StripeError::Rejected(message));
        }
        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let session: CheckoutSession =
            serde_json::from_str(&body).map_err(|e| StripeError::Parse(e.to_string()))?;
        debug!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    /// Expire an open checkout session so it can no longer be paid.
    ///
    /// # Errors
    ///
    /// `Rejected` when the session is unknown or already complete, `Api`/`Http`
    /// on upstream failures.
    #[instrument(skip(self))]
    pub async fn expire_checkout_session(&self, session_id: &str) -> Result<(), StripeError> {
        let response = self
            .inner
            .client
            .post(format!(
                "{}/checkout/sessions/{session_id}/expire",
                self.inner.api_base
            ))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Checkout session expired");
            return Ok(());
        }

        let body = response.text().await?;
        if status.is_client_error() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(StripeError::Rejected(message));
        }
        Err(StripeError::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

/// Form-encoded parameters for `POST /v1/checkout/sessions`.
fn session_form(
    request: &SessionRequest<'_>,
    currency: CurrencyCode,
) -> Result<Vec<(String, String)>, StripeError> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
    ];

    for (i, method) in PAYMENT_METHODS.iter().enumerate() {
        form.push((format!("payment_method_types[{i}]"), (*method).to_string()));
    }
    for (i, country) in SHIPPING_COUNTRIES.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            (*country).to_string(),
        ));
    }

    for (i, line) in request.lines.iter().enumerate() {
        let cents = Price::new(line.price, currency)
            .to_minor_units()
            .ok_or_else(|| StripeError::InvalidAmount(line.name.clone()))?;
        let prefix = format!("line_items[{i}]");

        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.processor_code().to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        if let Some(image) = line.image.as_deref().filter(|i| !i.is_empty()) {
            form.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.to_string(),
            ));
        }
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            cents.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    if let Some(user_id) = request.user_id {
        form.push(("client_reference_id".into(), user_id.to_string()));
    }
    if let Some(draft_id) = request.draft_order_id {
        form.push(("metadata[draft_order_id]".into(), draft_id.to_string()));
    }

    Ok(form)
}
