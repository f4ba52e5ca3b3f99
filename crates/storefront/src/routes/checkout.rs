//! Checkout session endpoint.

use axum::{Json, extract::State};

use colando_core::checkout::{CheckoutRedirect, CheckoutRequest};

use super::extract::ApiJson;
use crate::error::Result;
use crate::services;
use crate::state::AppState;

/// `POST /api/checkout/session`
#[tracing::instrument(skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<Json<CheckoutRedirect>> {
    let redirect = services::create_checkout(&state, &request).await?;
    Ok(Json(redirect))
}
