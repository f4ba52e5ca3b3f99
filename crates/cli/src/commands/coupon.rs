//! Coupon management commands.
//!
//! # Usage
//!
//! ```bash
//! colando coupon create bemvindo10 --type percentage --value 10
//! colando coupon create fretegratis --type free-shipping --expires-at 2026-12-31T23:59:59Z
//! colando coupon list
//! colando coupon deactivate BEMVINDO10
//! ```

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use rust_decimal::Decimal;
use thiserror::Error;

use colando_core::coupon::{Coupon, CouponCode, CouponError, DiscountKind, NewCoupon};
use colando_storefront::db::{CouponRepository, RepositoryError};

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum CouponCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Invalid(#[from] CouponError),

    #[error("Coupon already exists: {0}")]
    AlreadyExists(String),

    #[error("No coupon with code {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Discount type as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscountArg {
    Percentage,
    FixedAmount,
    FreeShipping,
}

impl DiscountArg {
    const fn tag(self) -> &'static str {
        match self {
            Self::Percentage => DiscountKind::PERCENTAGE,
            Self::FixedAmount => DiscountKind::FIXED_AMOUNT,
            Self::FreeShipping => DiscountKind::FREE_SHIPPING,
        }
    }
}

/// Build a coupon definition from command-line input.
///
/// The value is ignored for free-shipping coupons.
pub fn new_coupon(
    code: &str,
    kind: DiscountArg,
    value: Option<Decimal>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<NewCoupon, CouponError> {
    let kind = DiscountKind::from_parts(kind.tag(), value)?;
    NewCoupon::new(code, kind, expires_at)
}

/// Create a coupon.
pub async fn create(
    code: &str,
    kind: DiscountArg,
    value: Option<Decimal>,
    expires_at: Option<DateTime<Utc>>,
    inactive: bool,
) -> Result<Coupon, CouponCommandError> {
    let mut coupon = new_coupon(code, kind, value, expires_at)?;
    coupon.is_active = !inactive;

    let pool = connect().await?;
    let created = CouponRepository::new(&pool)
        .create(&coupon)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                CouponCommandError::AlreadyExists(coupon.code.to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(
        "Coupon created: {} ({}{})",
        created.code,
        created.kind.tag(),
        created
            .kind
            .value()
            .map(|v| format!(" {v}"))
            .unwrap_or_default()
    );
    Ok(created)
}

/// Print every coupon.
pub async fn list() -> Result<(), CouponCommandError> {
    let pool = connect().await?;
    let coupons = CouponRepository::new(&pool).list_all().await?;
    let now = Utc::now();

    #[allow(clippy::print_stdout)]
    {
        println!("{:<20} {:<14} {:>8}  {:<10} EXPIRES", "CODE", "TYPE", "VALUE", "STATE");
        for coupon in &coupons {
            let state = match coupon.validate(now) {
                Ok(()) => "active",
                Err(CouponError::Expired) => "expired",
                Err(_) => "inactive",
            };
            println!(
                "{:<20} {:<14} {:>8}  {:<10} {}",
                coupon.code,
                coupon.kind.tag(),
                coupon.kind.value().map(|v| v.to_string()).unwrap_or_default(),
                state,
                coupon
                    .expires_at
                    .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            );
        }
    }
    Ok(())
}

/// Switch a coupon off.
pub async fn deactivate(code: &str) -> Result<(), CouponCommandError> {
    let code = CouponCode::parse(code)?;
    let pool = connect().await?;
    CouponRepository::new(&pool)
        .deactivate(&code)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CouponCommandError::NotFound(code.to_string()),
            other => other.into(),
        })?;

    tracing::info!("Coupon deactivated: {code}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_coupon_rules() {
        let coupon = new_coupon("bemvindo10", DiscountArg::Percentage, Some(Decimal::TEN), None)
            .unwrap();
        assert_eq!(coupon.code.as_str(), "BEMVINDO10");
        assert_eq!(coupon.kind, DiscountKind::Percentage { value: Decimal::TEN });

        assert!(matches!(
            new_coupon("ab", DiscountArg::FixedAmount, Some(Decimal::TEN), None),
            Err(CouponError::InvalidDefinition(_))
        ));
        assert!(matches!(
            new_coupon("desconto", DiscountArg::FixedAmount, None, None),
            Err(CouponError::MissingValue(_))
        ));
        assert!(matches!(
            new_coupon("desconto", DiscountArg::FixedAmount, Some(Decimal::ZERO), None),
            Err(CouponError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_free_shipping_ignores_value() {
        let coupon =
            new_coupon("fretegratis", DiscountArg::FreeShipping, Some(Decimal::TEN), None).unwrap();
        assert_eq!(coupon.kind, DiscountKind::FreeShipping);
    }
}
