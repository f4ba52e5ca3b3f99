//! Customers' saved products.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use colando_core::wishlist::WishlistAdd;
use colando_core::{Product, ProductId, UserId};

use super::extract::{ApiJson, parse_id};
use crate::db::{RepositoryError, WishlistRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// `GET /api/users/{user_id}/wishlist`
#[tracing::instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Product>>> {
    let user: UserId = parse_id(&user_id, "user")?;
    let products = WishlistRepository::new(state.pool()).list(user).await?;
    Ok(Json(products))
}

/// `POST /api/users/{user_id}/wishlist`
///
/// 201 when the product was saved, 200 when it already was.
#[tracing::instrument(skip(state, body))]
pub async fn add(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<WishlistAdd>,
) -> Result<(StatusCode, Json<WishlistAdd>)> {
    let user: UserId = parse_id(&user_id, "user")?;

    let added = WishlistRepository::new(state.pool())
        .add(user, body.product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product".to_string()),
            other => other.into(),
        })?;

    let status = if added {
        tracing::info!(%user, product_id = %body.product_id, "Product saved to wishlist");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(body)))
}

/// `DELETE /api/users/{user_id}/wishlist/{product_id}`
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let user: UserId = parse_id(&user_id, "user")?;
    let product: ProductId = parse_id(&product_id, "product")?;

    if WishlistRepository::new(state.pool()).remove(user, product).await? {
        tracing::info!(%user, product_id = %product, "Product removed from wishlist");
    }
    Ok(StatusCode::NO_CONTENT)
}
