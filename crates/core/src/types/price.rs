//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are kept in the currency's standard unit (reais, not centavos) as
//! [`Decimal`]. Anything computed from other amounts (percentages, line totals)
//! is rounded with [`round_money`]. The payment processor wants integer minor
//! units, which [`Price::to_minor_units`] produces.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest amount a `NUMERIC(12, 2)` money column holds.
#[must_use]
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in Brazilian reais.
    #[must_use]
    pub const fn brl(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::BRL)
    }

    /// Amount in minor units (centavos), rounded half away from zero.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        round_money(self.amount)
            .checked_mul(Decimal::ONE_HUNDRED)?
            .to_i64()
    }

    /// Format for display, e.g. `R$ 1.234,50`.
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = round_money(self.amount);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = format!("{:.2}", rounded.abs());
        let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

        let (thousands, decimal) = self.currency_code.separators();
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(thousands);
            }
            grouped.push(ch);
        }

        format!(
            "{}{} {grouped}{decimal}{cents}",
            if negative { "-" } else { "" },
            self.currency_code.symbol()
        )
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Currency symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::BRL => "R$",
            Self::USD => "$",
            Self::EUR => "€",
        }
    }

    /// Lower-case code as the payment processor expects it.
    #[must_use]
    pub const fn processor_code(self) -> &'static str {
        match self {
            Self::BRL => "brl",
            Self::USD => "usd",
            Self::EUR => "eur",
        }
    }

    const fn separators(self) -> (char, char) {
        match self {
            Self::BRL | Self::EUR => ('.', ','),
            Self::USD => (',', '.'),
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brl" => Ok(Self::BRL),
            "usd" => Ok(Self::USD),
            "eur" => Ok(Self::EUR),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
        assert_eq!(round_money(Decimal::new(1004, 3)), Decimal::new(100, 2));
    }

    #[test]
    fn test_minor_units() {
        let price = Price::brl(Decimal::new(1999, 2));
        assert_eq!(price.to_minor_units(), Some(1999));

        let price = Price::brl(Decimal::new(333_335, 4));
        assert_eq!(price.to_minor_units(), Some(3334));
    }

    #[test]
    fn test_minor_units_out_of_range() {
        assert_eq!(Price::brl(Decimal::MAX).to_minor_units(), None);
        assert_eq!(Price::brl(Decimal::new(i64::MAX, 0)).to_minor_units(), None);
        assert_eq!(Price::brl(max_money()).to_minor_units(), Some(999_999_999_999));
    }

    #[test]
    fn test_display_brl() {
        assert_eq!(Price::brl(Decimal::new(123_450, 2)).display(), "R$ 1.234,50");
        assert_eq!(Price::brl(Decimal::ZERO).display(), "R$ 0,00");
        assert_eq!(Price::brl(Decimal::new(9, 1)).display(), "R$ 0,90");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("BRL".parse::<CurrencyCode>().unwrap(), CurrencyCode::BRL);
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }
}
