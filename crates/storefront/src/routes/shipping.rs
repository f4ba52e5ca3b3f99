//! Shipping quote endpoint.

use axum::{Json, extract::State};

use colando_core::shipping::{CarrierQuote, ShippingQuoteRequest};

use super::extract::ApiJson;
use crate::error::Result;
use crate::state::AppState;

/// `POST /api/shipping/quote`
///
/// Returns every carrier option that could be priced, unranked.
#[tracing::instrument(skip(state, request))]
pub async fn quote(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ShippingQuoteRequest>,
) -> Result<Json<Vec<CarrierQuote>>> {
    let request = request.validated()?;
    let quotes = state.shipping().quote(&request).await?;
    Ok(Json(quotes))
}
