//! Stripe webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload, so
//! it must be verified before any JSON parsing.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::services::{PgPaymentLedger, ReconcileError, reconcile};
use crate::state::AppState;
use crate::stripe::webhook::DEFAULT_TOLERANCE_SECS;
use crate::stripe::{SignatureError, WebhookEvent, verify_signature};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// `POST /api/stripe/webhook`
#[tracing::instrument(skip_all, fields(bytes = body.len()))]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader)?;

    let secret = state.config().stripe.webhook_secret.expose_secret();
    if let Err(e) = verify_signature(
        &body,
        signature,
        secret,
        Utc::now().timestamp(),
        DEFAULT_TOLERANCE_SECS,
    ) {
        warn!(error = %e, "Rejected webhook delivery");
        return Err(e.into());
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;

    let outcome = reconcile(&event, &PgPaymentLedger::new(state.pool()))
        .await
        .map_err(|e| match e {
            ReconcileError::Payload(e) => {
                AppError::BadRequest(format!("Invalid checkout session payload: {e}"))
            }
            ReconcileError::Ledger(e) => AppError::Database(e),
        })?;
    debug!(?outcome, "Webhook processed");

    Ok(Json(json!({ "ok": true })))
}
