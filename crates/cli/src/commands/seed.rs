//! Seed the database from YAML files.
//!
//! # Usage
//!
//! ```bash
//! colando seed coupons seeds/coupons.yaml
//! ```
//!
//! The coupon file is a list of coupon definitions:
//!
//! ```yaml
//! - code: bemvindo10
//!   type: PERCENTAGE
//!   value: 10
//! - code: fretegratis
//!   type: FREE_SHIPPING
//!   expires_at: 2026-12-31T23:59:59Z
//! ```
//!
//! Existing codes are updated in place, so the command can be re-run.

use std::path::Path;

use tracing::{error, info};

use colando_core::coupon::NewCoupon;
use colando_storefront::db::CouponRepository;

use super::connect;

/// Parse and validate a coupon seed file.
///
/// Returns every validation problem, not only the first.
pub fn parse_coupons(content: &str) -> Result<Vec<NewCoupon>, Box<dyn std::error::Error>> {
    let coupons: Vec<NewCoupon> = serde_yaml::from_str(content)?;

    let errors: Vec<String> = coupons
        .iter()
        .filter_map(|c| c.validate().err().map(|e| format!("{}: {e}", c.code)))
        .collect();
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    Ok(coupons)
}

/// Upsert the coupons defined in `file_path`.
pub async fn coupons(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading coupons from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let coupons = parse_coupons(&content)?;
    info!(coupons = coupons.len(), "Seed file validated");

    let pool = connect().await?;
    let repo = CouponRepository::new(&pool);
    for coupon in &coupons {
        let stored = repo.upsert(coupon).await?;
        info!(code = %stored.code, kind = stored.kind.tag(), active = stored.is_active, "Coupon seeded");
    }

    info!(count = coupons.len(), "Seeding complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use colando_core::coupon::DiscountKind;
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_parse_seed_file() {
        let coupons = parse_coupons(
            r"
- code: bemvindo10
  type: PERCENTAGE
  value: 10
- code: fretegratis
  type: FREE_SHIPPING
  is_active: false
  expires_at: 2026-12-31T23:59:59Z
",
        )
        .unwrap();

        assert_eq!(coupons.len(), 2);
        assert_eq!(coupons[0].code.as_str(), "BEMVINDO10");
        assert_eq!(coupons[0].kind, DiscountKind::Percentage { value: Decimal::TEN });
        assert!(coupons[0].is_active);
        assert_eq!(coupons[1].kind, DiscountKind::FreeShipping);
        assert!(!coupons[1].is_active);
        assert!(coupons[1].expires_at.is_some());
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let result = parse_coupons(
            r"
- code: ab
  type: FIXED_AMOUNT
  value: 5
- code: metade
  type: PERCENTAGE
  value: 150
",
        );
        assert!(result.is_err());
    }
}
