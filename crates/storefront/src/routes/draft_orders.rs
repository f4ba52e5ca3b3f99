//! Draft (customization) orders.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use colando_core::checkout::DraftOrderView;
use colando_core::{DraftOrderId, ProductId};

use super::extract::{ApiJson, parse_id};
use crate::db::{DraftOrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::DraftOrder;
use crate::state::AppState;

const MAX_PERSONALIZATION_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct CreateDraftOrder {
    pub product_id: ProductId,
    pub personalization_type: String,
}

/// `GET /api/draft-orders/{id}`
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DraftOrderView>> {
    let id: DraftOrderId = parse_id(&id, "draft order")?;
    DraftOrderRepository::new(state.pool())
        .get_view(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Draft order".to_string()))
}

/// `POST /api/draft-orders`
#[tracing::instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateDraftOrder>,
) -> Result<(StatusCode, Json<DraftOrder>)> {
    let personalization_type = body.personalization_type.trim();
    if personalization_type.is_empty() || personalization_type.len() > MAX_PERSONALIZATION_LEN {
        return Err(AppError::BadRequest(
            "personalization_type is required".to_string(),
        ));
    }

    let draft = DraftOrderRepository::new(state.pool())
        .create(body.product_id, personalization_type)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product".to_string()),
            other => other.into(),
        })?;

    tracing::info!(draft_order_id = %draft.id, product_id = %body.product_id, "Draft order created");
    Ok((StatusCode::CREATED, Json(draft)))
}
