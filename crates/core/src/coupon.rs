//! Coupons and discount computation.
//!
//! A coupon is fetched from the remote table by code; whether it may be used is
//! decided by [`Coupon::validate`], a pure function of the record and the
//! current time. The monetary discount is likewise a pure function of the
//! coupon and the subtotal ([`compute_discount`]) and is recomputed on every
//! read instead of being cached.

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CouponId, round_money};

/// Reasons a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// No coupon with that code.
    #[error("Invalid coupon.")]
    InvalidCoupon,

    /// Coupon exists but has been switched off.
    #[error("This coupon is no longer active.")]
    Inactive,

    /// Coupon's expiration timestamp is in the past.
    #[error("This coupon has expired.")]
    Expired,

    /// Stored discount type is not one we know how to price.
    #[error("unknown discount type: {0}")]
    UnknownDiscountType(String),

    /// Percentage or fixed-amount coupon without a value.
    #[error("discount type {0} requires a value")]
    MissingValue(&'static str),

    /// The lookup itself failed (network, backend).
    #[error("coupon lookup failed: {0}")]
    Lookup(String),

    /// A coupon being created breaks the back-office rules.
    #[error("invalid coupon: {0}")]
    InvalidDefinition(&'static str),
}

/// A normalized coupon code.
///
/// Codes are matched case-insensitively; the canonical form is trimmed and
/// upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Normalize a user-entered code.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::InvalidCoupon` for an empty code.
    pub fn parse(raw: &str) -> Result<Self, CouponError> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            return Err(CouponError::InvalidCoupon);
        }
        Ok(Self(code))
    }

    /// Borrow the canonical code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CouponCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

/// What a coupon takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// `value` percent of the subtotal.
    Percentage { value: Decimal },
    /// A flat `value` off the subtotal.
    FixedAmount { value: Decimal },
    /// Waives the selected shipping option; no monetary discount on items.
    FreeShipping,
}

impl DiscountKind {
    pub const PERCENTAGE: &'static str = "PERCENTAGE";
    pub const FIXED_AMOUNT: &'static str = "FIXED_AMOUNT";
    pub const FREE_SHIPPING: &'static str = "FREE_SHIPPING";

    /// Decode the `(type, value)` column pair stored in the coupons table.
    ///
    /// # Errors
    ///
    /// Rejects unknown tags and value-less percentage/fixed coupons.
    pub fn from_parts(tag: &str, value: Option<Decimal>) -> Result<Self, CouponError> {
        match tag {
            Self::PERCENTAGE => value
                .map(|value| Self::Percentage { value })
                .ok_or(CouponError::MissingValue(Self::PERCENTAGE)),
            Self::FIXED_AMOUNT => value
                .map(|value| Self::FixedAmount { value })
                .ok_or(CouponError::MissingValue(Self::FIXED_AMOUNT)),
            Self::FREE_SHIPPING => Ok(Self::FreeShipping),
            other => Err(CouponError::UnknownDiscountType(other.to_owned())),
        }
    }

    /// The `type` column value.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Percentage { .. } => Self::PERCENTAGE,
            Self::FixedAmount { .. } => Self::FIXED_AMOUNT,
            Self::FreeShipping => Self::FREE_SHIPPING,
        }
    }

    /// The `value` column value.
    #[must_use]
    pub const fn value(&self) -> Option<Decimal> {
        match self {
            Self::Percentage { value } | Self::FixedAmount { value } => Some(*value),
            Self::FreeShipping => None,
        }
    }
}

/// A coupon record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    #[serde(flatten)]
    pub kind: DiscountKind,
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Check the active flag and the expiration window.
    ///
    /// # Errors
    ///
    /// `Inactive` when switched off, `Expired` when `expires_at < now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.expires_at.is_some_and(|expires_at| expires_at < now) {
            return Err(CouponError::Expired);
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        compute_discount(&self.kind, subtotal)
    }

    /// Whether the coupon waives shipping.
    #[must_use]
    pub const fn waives_shipping(&self) -> bool {
        matches!(self.kind, DiscountKind::FreeShipping)
    }
}

/// A coupon to be created.
///
/// Deserializes from the seed-file shape:
///
/// ```yaml
/// - code: bemvindo10
///   type: PERCENTAGE
///   value: 10
///   expires_at: 2026-12-31T23:59:59Z
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: CouponCode,
    #[serde(flatten)]
    pub kind: DiscountKind,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl NewCoupon {
    /// Minimum code length accepted by the back office.
    pub const MIN_CODE_LEN: usize = 3;

    /// Build and check a new coupon definition.
    ///
    /// # Errors
    ///
    /// `InvalidDefinition` for a code shorter than three characters or a
    /// non-positive value on a percentage/fixed coupon.
    pub fn new(
        code: &str,
        kind: DiscountKind,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, CouponError> {
        let coupon = Self {
            code: CouponCode::parse(code)?,
            kind,
            is_active: true,
            expires_at,
        };
        coupon.validate()?;
        Ok(coupon)
    }

    /// Re-check rules, e.g. after deserializing.
    ///
    /// # Errors
    ///
    /// See [`NewCoupon::new`].
    pub fn validate(&self) -> Result<(), CouponError> {
        if self.code.as_str().chars().count() < Self::MIN_CODE_LEN {
            return Err(CouponError::InvalidDefinition(
                "code must have at least 3 characters",
            ));
        }
        if self.kind.value().is_some_and(|v| v <= Decimal::ZERO) {
            return Err(CouponError::InvalidDefinition("value must be greater than zero"));
        }
        if let DiscountKind::Percentage { value } = self.kind
            && value > Decimal::ONE_HUNDRED
        {
            return Err(CouponError::InvalidDefinition(
                "percentage cannot exceed 100",
            ));
        }
        Ok(())
    }
}

/// Monetary discount for `kind` on `subtotal`, clamped to `[0, subtotal]`.
#[must_use]
pub fn compute_discount(kind: &DiscountKind, subtotal: Decimal) -> Decimal {
    let subtotal = subtotal.max(Decimal::ZERO);
    let raw = match kind {
        DiscountKind::Percentage { value } => {
            round_money((*value / Decimal::ONE_HUNDRED).saturating_mul(subtotal))
        }
        DiscountKind::FixedAmount { value } => *value,
        DiscountKind::FreeShipping => Decimal::ZERO,
    };
    raw.clamp(Decimal::ZERO, subtotal)
}

/// Remote lookup of coupons by code.
pub trait CouponSource {
    type Error: std::fmt::Display;

    /// Fetch the coupon with exactly this (normalized) code, if any.
    fn find_coupon(
        &self,
        code: &CouponCode,
    ) -> impl Future<Output = Result<Option<Coupon>, Self::Error>> + Send;
}

/// Normalize `raw_code`, look it up and check that it is usable at `now`.
///
/// # Errors
///
/// `InvalidCoupon` when empty or not found, `Inactive`/`Expired` from
/// [`Coupon::validate`], `Lookup` when the source fails.
pub async fn resolve_coupon<S: CouponSource + Sync>(
    source: &S,
    raw_code: &str,
    now: DateTime<Utc>,
) -> Result<Coupon, CouponError> {
    let code = CouponCode::parse(raw_code)?;
    let coupon = source
        .find_coupon(&code)
        .await
        .map_err(|e| CouponError::Lookup(e.to_string()))?
        .ok_or(CouponError::InvalidCoupon)?;
    coupon.validate(now)?;
    Ok(coupon)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::convert::Infallible;

    use chrono::Duration;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn coupon(code: &str, kind: DiscountKind) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: CouponCode::parse(code).unwrap(),
            kind,
            is_active: true,
            expires_at: None,
        }
    }

    struct Table(HashMap<String, Coupon>);

    impl CouponSource for Table {
        type Error = Infallible;

        async fn find_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, Infallible> {
            Ok(self.0.get(code.as_str()).cloned())
        }
    }

    #[test]
    fn test_code_is_normalized() {
        let code = CouponCode::parse("  bemvindo10 ").unwrap();
        assert_eq!(code.as_str(), "BEMVINDO10");
        assert_eq!(CouponCode::parse("   "), Err(CouponError::InvalidCoupon));
    }

    #[test]
    fn test_percentage_discount() {
        let kind = DiscountKind::Percentage { value: dec("10") };
        assert_eq!(compute_discount(&kind, dec("100.00")), dec("10.00"));
    }

    #[test]
    fn test_fixed_discount_clamped_to_subtotal() {
        let kind = DiscountKind::FixedAmount { value: dec("50.00") };
        assert_eq!(compute_discount(&kind, dec("30.00")), dec("30.00"));
    }

    #[test]
    fn test_free_shipping_has_no_monetary_discount() {
        assert_eq!(
            compute_discount(&DiscountKind::FreeShipping, dec("80")),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_discount_always_within_bounds() {
        let kinds = [
            DiscountKind::Percentage { value: dec("0") },
            DiscountKind::Percentage { value: dec("33.3") },
            DiscountKind::Percentage { value: dec("150") },
            DiscountKind::Percentage { value: dec("-20") },
            DiscountKind::FixedAmount { value: dec("0.01") },
            DiscountKind::FixedAmount { value: dec("1000") },
            DiscountKind::FixedAmount { value: dec("-5") },
            DiscountKind::FreeShipping,
        ];
        let subtotals = ["0", "0.01", "9.99", "100", "12345.67"];

        for kind in &kinds {
            for subtotal in subtotals {
                let subtotal = dec(subtotal);
                let discount = compute_discount(kind, subtotal);
                assert!(discount >= Decimal::ZERO, "{kind:?} on {subtotal}");
                assert!(discount <= subtotal, "{kind:?} on {subtotal}");
            }
        }
    }

    #[test]
    fn test_from_parts_rejects_unknown_tags() {
        assert_eq!(
            DiscountKind::from_parts("BOGO", Some(dec("1"))),
            Err(CouponError::UnknownDiscountType("BOGO".to_owned()))
        );
        assert_eq!(
            DiscountKind::from_parts("PERCENTAGE", None),
            Err(CouponError::MissingValue("PERCENTAGE"))
        );
        assert_eq!(
            DiscountKind::from_parts("FREE_SHIPPING", None),
            Ok(DiscountKind::FreeShipping)
        );
    }

    #[test]
    fn test_validate_inactive_and_expired() {
        let now = Utc::now();
        let mut c = coupon("X", DiscountKind::FreeShipping);
        assert!(c.validate(now).is_ok());

        c.expires_at = Some(now + Duration::days(1));
        assert!(c.validate(now).is_ok());

        c.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(c.validate(now), Err(CouponError::Expired));

        c.is_active = false;
        assert_eq!(c.validate(now), Err(CouponError::Inactive));
    }

    #[test]
    fn test_wire_format_is_tagged() {
        let c = coupon("off10", DiscountKind::Percentage { value: dec("10") });
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "PERCENTAGE");
        assert_eq!(json["code"], "OFF10");

        let back: Coupon = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);

        let unknown = serde_json::json!({
            "id": 2, "code": "X", "type": "MYSTERY", "is_active": true
        });
        assert!(serde_json::from_value::<Coupon>(unknown).is_err());
    }

    #[test]
    fn test_new_coupon_rules() {
        assert!(NewCoupon::new("ab", DiscountKind::FreeShipping, None).is_err());
        assert!(
            NewCoupon::new("ZERO", DiscountKind::FixedAmount { value: Decimal::ZERO }, None)
                .is_err()
        );
        assert!(
            NewCoupon::new("HUGE", DiscountKind::Percentage { value: dec("120") }, None).is_err()
        );

        let ok = NewCoupon::new("frete", DiscountKind::FreeShipping, None).unwrap();
        assert_eq!(ok.code.as_str(), "FRETE");
        assert!(ok.is_active);
    }

    #[test]
    fn test_new_coupon_from_seed_shape() {
        let json = serde_json::json!({ "code": "bemvindo10", "type": "PERCENTAGE", "value": 10 });
        let seeded: NewCoupon = serde_json::from_value(json).unwrap();
        assert_eq!(seeded.code.as_str(), "BEMVINDO10");
        assert_eq!(seeded.kind, DiscountKind::Percentage { value: dec("10") });
        assert!(seeded.is_active);
        assert!(seeded.validate().is_ok());
    }

    #[tokio::test]
    async fn test_resolve_coupon_outcomes() {
        let now = Utc::now();
        let mut expired = coupon("OLD", DiscountKind::FixedAmount { value: dec("5") });
        expired.expires_at = Some(now - Duration::days(2));
        let mut off = coupon("OFF", DiscountKind::FreeShipping);
        off.is_active = false;

        let table = Table(HashMap::from([
            ("TEN".to_owned(), coupon("TEN", DiscountKind::Percentage { value: dec("10") })),
            ("OLD".to_owned(), expired),
            ("OFF".to_owned(), off),
        ]));

        assert_eq!(resolve_coupon(&table, "ten", now).await.unwrap().code.as_str(), "TEN");
        assert_eq!(
            resolve_coupon(&table, "nope", now).await,
            Err(CouponError::InvalidCoupon)
        );
        assert_eq!(resolve_coupon(&table, "old", now).await, Err(CouponError::Expired));
        assert_eq!(resolve_coupon(&table, "Off", now).await, Err(CouponError::Inactive));
    }
}
