//! Coupon repository.
//!
//! Coupons are stored as a `(type, value)` column pair and decoded into
//! [`DiscountKind`] at this boundary; a row with an unknown type is reported as
//! data corruption instead of being guessed at.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use colando_core::CouponId;
use colando_core::coupon::{Coupon, CouponCode, CouponSource, DiscountKind, NewCoupon};

use super::RepositoryError;

const COUPON_COLUMNS: &str = "id, code, type, value, is_active, expires_at";

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    #[sqlx(rename = "type")]
    kind: String,
    value: Option<Decimal>,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let code = CouponCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid coupon code in database: {e}"))
        })?;
        let kind = DiscountKind::from_parts(&row.kind, row.value).map_err(|e| {
            RepositoryError::DataCorruption(format!("coupon {}: {e}", row.id))
        })?;

        Ok(Self {
            id: CouponId::new(row.id),
            code,
            kind,
            is_active: row.is_active,
            expires_at: row.expires_at,
        })
    }
}

/// Repository for coupon database operations.
#[derive(Clone, Copy)]
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a coupon by its normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored type is unknown.
    pub async fn get_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List all coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Insert a new coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, coupon: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO coupons (code, type, value, is_active, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(coupon.code.as_str())
        .bind(coupon.kind.tag())
        .bind(coupon.kind.value())
        .bind(coupon.is_active)
        .bind(coupon.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "coupon code"))?;

        row.try_into()
    }

    /// Insert or replace a coupon by code. Used by seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, coupon: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO coupons (code, type, value, is_active, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO UPDATE
               SET type = EXCLUDED.type,
                   value = EXCLUDED.value,
                   is_active = EXCLUDED.is_active,
                   expires_at = EXCLUDED.expires_at
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(coupon.code.as_str())
        .bind(coupon.kind.tag())
        .bind(coupon.kind.value())
        .bind(coupon.is_active)
        .bind(coupon.expires_at)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Switch a coupon off.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no coupon has that code.
    pub async fn deactivate(&self, code: &CouponCode) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE coupons SET is_active = FALSE WHERE code = $1")
            .bind(code.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl CouponSource for CouponRepository<'_> {
    type Error = RepositoryError;

    async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        self.get_by_code(code).await
    }
}
