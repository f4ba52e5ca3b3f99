//! Order back-office commands.
//!
//! # Usage
//!
//! ```bash
//! colando order list --status paid
//! colando order status 42 shipped --tracking BR123456789
//! ```

use thiserror::Error;

use colando_core::{OrderId, OrderStatus};
use colando_storefront::db::{OrderRepository, RepositoryError};

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum OrderCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("{0}")]
    InvalidStatus(String),

    #[error("No order with id {0}")]
    NotFound(OrderId),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Print orders, newest first.
pub async fn list(status: Option<&str>) -> Result<(), OrderCommandError> {
    let status = status
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(OrderCommandError::InvalidStatus)?;

    let pool = connect().await?;
    let orders = OrderRepository::new(&pool).list(status).await?;

    #[allow(clippy::print_stdout)]
    {
        for order in &orders {
            println!(
                "#{:<6} {:<17} R$ {:>9}  {}  {}",
                order.id.as_i32(),
                order.status,
                order.total,
                order.created_at.format("%Y-%m-%d %H:%M"),
                order.customer_email.as_deref().unwrap_or("-"),
            );
            for item in &order.items {
                println!("         {} x {} @ {}", item.quantity, item.name, item.price);
            }
            if let Some(tracking) = &order.tracking_code {
                println!("         tracking: {tracking}");
            }
        }
        println!("{} order(s)", orders.len());
    }
    Ok(())
}

/// Move an order to `status`, optionally recording a tracking code.
pub async fn set_status(
    id: i32,
    status: &str,
    tracking_code: Option<&str>,
) -> Result<(), OrderCommandError> {
    let id = OrderId::new(id);
    let status: OrderStatus = status.parse().map_err(OrderCommandError::InvalidStatus)?;
    let tracking_code = tracking_code.map(str::trim).filter(|t| !t.is_empty());

    let pool = connect().await?;
    OrderRepository::new(&pool)
        .set_status(id, status, tracking_code)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => OrderCommandError::NotFound(id),
            other => other.into(),
        })?;

    tracing::info!(order_id = %id, %status, tracking = ?tracking_code, "Order updated");
    Ok(())
}
