//! Draft order repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use colando_core::checkout::{DraftOrderView, DraftProduct};
use colando_core::{DraftOrderId, DraftOrderStatus, ProductId};

use super::RepositoryError;
use crate::models::{DraftOrder, PaymentDetails};

const DRAFT_COLUMNS: &str = "id, product_id, personalization_type, status, delivery_address, \
                             stripe_session_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct DraftOrderRow {
    id: DraftOrderId,
    product_id: Option<i32>,
    personalization_type: String,
    status: DraftOrderStatus,
    delivery_address: Option<Json<serde_json::Value>>,
    stripe_session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DraftOrderRow> for DraftOrder {
    fn from(row: DraftOrderRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id.map(ProductId::new),
            personalization_type: row.personalization_type,
            status: row.status,
            delivery_address: row.delivery_address.map(|Json(v)| v),
            stripe_session_id: row.stripe_session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DraftViewRow {
    id: DraftOrderId,
    product_id: Option<i32>,
    personalization_type: String,
    status: DraftOrderStatus,
    product_name: Option<String>,
    product_price: Option<Decimal>,
    product_image: Option<String>,
}

impl From<DraftViewRow> for DraftOrderView {
    fn from(row: DraftViewRow) -> Self {
        let product = match (row.product_name, row.product_price) {
            (Some(name), Some(price)) => Some(DraftProduct {
                name,
                price,
                image: row.product_image.filter(|i| !i.is_empty()),
            }),
            _ => None,
        };
        Self {
            id: row.id,
            product_id: row.product_id.map(ProductId::new),
            personalization_type: row.personalization_type,
            status: row.status,
            product,
        }
    }
}

/// Repository for draft order database operations.
#[derive(Clone, Copy)]
pub struct DraftOrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DraftOrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a draft order joined with its product, as checkout needs it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_view(&self, id: DraftOrderId) -> Result<Option<DraftOrderView>, RepositoryError> {
        let row = sqlx::query_as::<_, DraftViewRow>(
            r"
            SELECT d.id, d.product_id, d.personalization_type, d.status,
                   p.name AS product_name, p.price AS product_price, p.image AS product_image
            FROM draft_orders d
            LEFT JOIN products p ON p.id = d.product_id
            WHERE d.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(DraftOrderView::from))
    }

    /// List draft orders, newest first, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<DraftOrderStatus>,
    ) -> Result<Vec<DraftOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, DraftOrderRow>(&format!(
            r"
            SELECT {DRAFT_COLUMNS} FROM draft_orders
            WHERE ($1::draft_order_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(DraftOrder::from).collect())
    }

    /// Create a draft order in status `draft`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn create(
        &self,
        product_id: ProductId,
        personalization_type: &str,
    ) -> Result<DraftOrder, RepositoryError> {
        let row = sqlx::query_as::<_, DraftOrderRow>(&format!(
            r"
            INSERT INTO draft_orders (id, product_id, personalization_type)
            SELECT $1, p.id, $3 FROM products p WHERE p.id = $2
            RETURNING {DRAFT_COLUMNS}
            "
        ))
        .bind(DraftOrderId::generate())
        .bind(product_id)
        .bind(personalization_type)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Set a draft's status (admin action).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no draft has that id.
    pub async fn set_status(
        &self,
        id: DraftOrderId,
        status: DraftOrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE draft_orders SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a completed payment for a draft.
    ///
    /// Moves the draft to `payment_approved` and stores the delivery address and
    /// session id, unless an admin has already moved it past that point.
    /// Returns the draft's status afterwards, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn confirm_payment(
        &self,
        id: DraftOrderId,
        payment: &PaymentDetails,
    ) -> Result<Option<DraftOrderStatus>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<DraftOrderStatus> =
            sqlx::query_scalar("SELECT status FROM draft_orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            return Ok(None);
        };
        if !current.accepts_payment_confirmation() {
            return Ok(Some(current));
        }

        sqlx::query(
            r"
            UPDATE draft_orders
               SET status = $2,
                   delivery_address = $3,
                   stripe_session_id = $4,
                   updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(id)
        .bind(DraftOrderStatus::PaymentApproved)
        .bind(payment.address.clone().map(Json))
        .bind(&payment.session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(DraftOrderStatus::PaymentApproved))
    }
}
