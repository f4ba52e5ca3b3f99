//! Order repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use colando_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderItem, PaymentDetails};

const ORDER_COLUMNS: &str = "id, user_id, total, status, stripe_session_id, shipping_address, \
                             customer_name, customer_email, tracking_code, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    total: Decimal,
    status: OrderStatus,
    stripe_session_id: Option<String>,
    shipping_address: Option<Json<serde_json::Value>>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    tracking_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            total: self.total,
            status: self.status,
            stripe_session_id: self.stripe_session_id,
            shipping_address: self.shipping_address.map(|Json(v)| v),
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            tracking_code: self.tracking_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    name: String,
    quantity: i32,
    price: Decimal,
    image: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            quantity: row.quantity,
            price: row.price,
            image: row.image.filter(|i| !i.is_empty()),
        }
    }
}

/// Repository for order database operations.
#[derive(Clone, Copy)]
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an order awaiting payment, with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the session id is already recorded.
    pub async fn create_pending(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders (user_id, total, status, stripe_session_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(order.user_id)
        .bind(order.total())
        .bind(OrderStatus::AwaitingPayment)
        .bind(&order.stripe_session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "checkout session"))?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, name, quantity, price)
                VALUES ($1, (SELECT p.id FROM products p WHERE p.id = $2), $3, $4, $5)
                ",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut items = self.items_for(&[id]).await?;
        let items = items.remove(&id).unwrap_or_default();
        Ok(Some(row.into_order(items)))
    }

    /// List orders, newest first, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }

    async fn items_for(
        &self,
        ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let raw_ids: Vec<i32> = ids.iter().map(OrderId::as_i32).collect();

        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT oi.id, oi.order_id, oi.product_id, oi.name, oi.quantity, oi.price,
                   p.image
            FROM order_items oi
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.id
            ",
        )
        .bind(raw_ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    /// Set an order's status and, optionally, its tracking code (admin action).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has that id.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        tracking_code: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
               SET status = $2,
                   tracking_code = COALESCE($3, tracking_code),
                   updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(tracking_code)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a completed payment for the order created with this session.
    ///
    /// Returns the order's id and status afterwards, or `None` if no order was
    /// recorded for the session. Orders already moved past `paid` are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn confirm_payment(
        &self,
        payment: &PaymentDetails,
    ) -> Result<Option<(OrderId, OrderStatus)>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(OrderId, OrderStatus)> = sqlx::query_as(
            "SELECT id, status FROM orders WHERE stripe_session_id = $1 FOR UPDATE",
        )
        .bind(&payment.session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, status)) = current else {
            return Ok(None);
        };
        if !status.accepts_payment_confirmation() {
            return Ok(Some((id, status)));
        }

        sqlx::query(
            r"
            UPDATE orders
               SET status = $2,
                   shipping_address = COALESCE($3, shipping_address),
                   customer_name = COALESCE($4, customer_name),
                   customer_email = COALESCE($5, customer_email),
                   updated_at = now()
             WHERE id = $1
            ",
        )
        .bind(id)
        .bind(OrderStatus::Paid)
        .bind(payment.address.clone().map(Json))
        .bind(payment.customer_name.as_deref())
        .bind(payment.customer_email.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((id, OrderStatus::Paid)))
    }
}
