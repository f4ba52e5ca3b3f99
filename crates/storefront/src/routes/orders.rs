//! Customer order history.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use colando_core::{OrderId, UserId};

use super::extract::{ApiQuery, parse_id};
use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::Order;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub user_id: Option<String>,
}

/// `GET /api/orders?user_id=`
#[tracing::instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<Vec<Order>>> {
    let raw = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("user_id is required".to_string()))?;
    let user: UserId = parse_id(&raw, "user")?;

    let orders = OrderRepository::new(state.pool()).list_for_user(user).await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}`
#[tracing::instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, "order")?;
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}
