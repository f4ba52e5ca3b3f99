//! Draft (customization) order commands.
//!
//! # Usage
//!
//! ```bash
//! colando draft create 12 --personalization photo
//! colando draft list --status payment_approved
//! colando draft status 0b6c1f7e-1b55-4a43-9d57-5d8f1e0b2a10 in_production
//! ```

use thiserror::Error;

use colando_core::{DraftOrderId, DraftOrderStatus, ProductId};
use colando_storefront::db::{DraftOrderRepository, RepositoryError};

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum DraftCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("{0}")]
    InvalidStatus(String),

    #[error("Invalid draft order id: {0}")]
    InvalidId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Create a draft order for a product.
pub async fn create(
    product_id: i32,
    personalization_type: &str,
) -> Result<DraftOrderId, DraftCommandError> {
    let product_id = ProductId::new(product_id);
    let pool = connect().await?;
    let draft = DraftOrderRepository::new(&pool)
        .create(product_id, personalization_type.trim())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => DraftCommandError::NotFound(format!("product {product_id}")),
            other => other.into(),
        })?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", draft.id);
    }
    tracing::info!(draft_order_id = %draft.id, %product_id, "Draft order created");
    Ok(draft.id)
}

/// Print draft orders, newest first.
pub async fn list(status: Option<&str>) -> Result<(), DraftCommandError> {
    let status = status
        .map(str::parse::<DraftOrderStatus>)
        .transpose()
        .map_err(DraftCommandError::InvalidStatus)?;

    let pool = connect().await?;
    let drafts = DraftOrderRepository::new(&pool).list(status).await?;

    #[allow(clippy::print_stdout)]
    {
        for draft in &drafts {
            println!(
                "{}  {:<17} product {:<6} {:<12} {}",
                draft.id,
                draft.status,
                draft
                    .product_id
                    .map_or_else(|| "-".to_string(), |p| p.to_string()),
                draft.personalization_type,
                draft.created_at.format("%Y-%m-%d %H:%M"),
            );
        }
        println!("{} draft order(s)", drafts.len());
    }
    Ok(())
}

/// Move a draft order to `status`.
pub async fn set_status(id: &str, status: &str) -> Result<(), DraftCommandError> {
    let id: DraftOrderId = id
        .parse()
        .map_err(|_| DraftCommandError::InvalidId(id.to_string()))?;
    let status: DraftOrderStatus = status.parse().map_err(DraftCommandError::InvalidStatus)?;

    let pool = connect().await?;
    DraftOrderRepository::new(&pool)
        .set_status(id, status)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => DraftCommandError::NotFound(format!("draft order {id}")),
            other => other.into(),
        })?;

    tracing::info!(draft_order_id = %id, %status, "Draft order updated");
    Ok(())
}
