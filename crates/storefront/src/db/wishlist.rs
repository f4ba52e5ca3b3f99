//! Wishlist repository.

use sqlx::PgPool;

use colando_core::{Product, ProductId, UserId};

use super::RepositoryError;
use super::products::{PRODUCT_SELECT, ProductRow};

/// Repository for customers' saved products.
#[derive(Clone, Copy)]
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Products saved by `user`, most recently saved first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"{PRODUCT_SELECT}
            JOIN wishlist w ON w.product_id = p.id
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC, p.id DESC
            "
        ))
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Save `product` for `user`. Returns `false` if it was already saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let (product_exists, added): (bool, bool) = sqlx::query_as(
            r"
            WITH product AS (
                SELECT id FROM products WHERE id = $2
            ), inserted AS (
                INSERT INTO wishlist (user_id, product_id)
                SELECT $1, id FROM product
                ON CONFLICT DO NOTHING
                RETURNING product_id
            )
            SELECT EXISTS (SELECT 1 FROM product), EXISTS (SELECT 1 FROM inserted)
            ",
        )
        .bind(user)
        .bind(product)
        .fetch_one(self.pool)
        .await?;

        if !product_exists {
            return Err(RepositoryError::NotFound);
        }
        Ok(added)
    }

    /// Forget `product` for `user`. Returns `false` if it was not saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM wishlist WHERE user_id = $1 AND product_id = $2")
            .bind(user)
            .bind(product)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
