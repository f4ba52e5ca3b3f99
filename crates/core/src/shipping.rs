//! Shipping quotes.
//!
//! The storefront asks the rate aggregator for carrier options and passes them
//! through; the client keeps the ones with a usable price and shows them
//! cheapest first ([`rank_options`]).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors validating a quote request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingError {
    #[error("Invalid postal code: expected 8 digits")]
    InvalidPostalCode,

    #[error("At least one product is required to quote shipping")]
    NoParcels,

    #[error("Invalid parcel: {0}")]
    InvalidParcel(&'static str),
}

/// One package (or group of identical packages) to ship.
///
/// Dimensions are centimeters, weight is kilograms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub width: Decimal,
    pub height: Decimal,
    pub length: Decimal,
    pub weight: Decimal,
    pub insurance_value: Decimal,
    pub quantity: u32,
}

impl Parcel {
    /// Default box for a cart line: 15 x 15 x 15 cm, 3 g, insured at the unit price.
    #[must_use]
    pub fn for_line(unit_price: Decimal, quantity: u32) -> Self {
        Self {
            width: Decimal::from(15),
            height: Decimal::from(15),
            length: Decimal::from(15),
            weight: Decimal::new(3, 3),
            insurance_value: unit_price,
            quantity,
        }
    }

    fn validate(&self) -> Result<(), ShippingError> {
        if self.quantity == 0 {
            return Err(ShippingError::InvalidParcel("quantity must be positive"));
        }
        let dims = [self.width, self.height, self.length, self.weight];
        if dims.iter().any(|d| *d <= Decimal::ZERO) {
            return Err(ShippingError::InvalidParcel(
                "dimensions and weight must be positive",
            ));
        }
        if self.insurance_value < Decimal::ZERO {
            return Err(ShippingError::InvalidParcel(
                "insurance value cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Strip formatting from a CEP and check it has exactly 8 digits.
///
/// # Errors
///
/// Returns `ShippingError::InvalidPostalCode` otherwise.
pub fn normalize_postal_code(raw: &str) -> Result<String, ShippingError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 8 {
        Ok(digits)
    } else {
        Err(ShippingError::InvalidPostalCode)
    }
}

/// Body of `POST /api/shipping/quote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuoteRequest {
    pub to_postal_code: String,
    pub products: Vec<Parcel>,
}

impl ShippingQuoteRequest {
    /// Validate and return a copy with the CEP normalized.
    ///
    /// # Errors
    ///
    /// Any [`ShippingError`].
    pub fn validated(&self) -> Result<Self, ShippingError> {
        let to_postal_code = normalize_postal_code(&self.to_postal_code)?;
        if self.products.is_empty() {
            return Err(ShippingError::NoParcels);
        }
        for parcel in &self.products {
            parcel.validate()?;
        }
        Ok(Self {
            to_postal_code,
            products: self.products.clone(),
        })
    }
}

/// Company block of a carrier quote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierCompany {
    #[serde(default)]
    pub name: String,
}

/// A carrier option as the aggregator reports it.
///
/// `price` arrives as a string (`"23.50"`), sometimes as a number, and is
/// missing when the carrier could not quote; in that case `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierQuote {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub delivery_time: Option<u32>,
    #[serde(default)]
    pub company: CarrierCompany,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CarrierQuote {
    /// Numeric price, if the carrier quoted one.
    #[must_use]
    pub fn parsed_price(&self) -> Option<Decimal> {
        match self.price.as_ref()? {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }
}

/// A shipping option the customer can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub id: i64,
    pub name: String,
    pub carrier: String,
    pub price: Decimal,
    pub delivery_days: Option<u32>,
}

/// Keep the quotes with a numeric price and no error, cheapest first.
#[must_use]
pub fn rank_options(quotes: &[CarrierQuote]) -> Vec<ShippingOption> {
    let mut options: Vec<ShippingOption> = quotes
        .iter()
        .filter(|q| q.error.is_none())
        .filter_map(|q| {
            Some(ShippingOption {
                id: q.id,
                name: q.name.clone(),
                carrier: q.company.name.clone(),
                price: q.parsed_price()?,
                delivery_days: q.delivery_time,
            })
        })
        .collect();
    options.sort_by(|a, b| a.price.cmp(&b.price));
    options
}
