//! Status enums for draft orders and orders.
//!
//! Both map to Postgres enum types created by the storefront migrations.
//!
//! ```text
//! draft order:  draft -> payment_approved -> in_production -> shipped -> delivered
//!                    \________________________________________________-> canceled
//! order:        awaiting_payment -> paid -> shipped -> delivered
//!                    \______________________________-> canceled
//! ```
//!
//! The webhook only ever performs the first transition of each chain; the rest
//! are admin actions.

use serde::{Deserialize, Serialize};

/// Status of a store-assisted customization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "draft_order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DraftOrderStatus {
    /// Created, waiting for the customer to pay.
    #[default]
    Draft,
    /// Payment confirmed by the processor.
    PaymentApproved,
    /// The design is being produced.
    InProduction,
    Shipped,
    Delivered,
    Canceled,
}

impl DraftOrderStatus {
    /// States from which a payment confirmation may (re)apply.
    ///
    /// Replaying the confirmation on an approved draft is a no-op overwrite;
    /// it must never pull a draft back from a later admin-set state.
    #[must_use]
    pub const fn accepts_payment_confirmation(self) -> bool {
        matches!(self, Self::Draft | Self::PaymentApproved)
    }

    /// Database/wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PaymentApproved => "payment_approved",
            Self::InProduction => "in_production",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for DraftOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for DraftOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "payment_approved" => Ok(Self::PaymentApproved),
            "in_production" => Ok(Self::InProduction),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("invalid draft order status: {s}")),
        }
    }
}

/// Status of a cart order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Checkout session created, payment not yet confirmed.
    #[default]
    AwaitingPayment,
    Paid,
    Shipped,
    Delivered,
    Canceled,
}

impl OrderStatus {
    /// States from which a payment confirmation may (re)apply.
    #[must_use]
    pub const fn accepts_payment_confirmation(self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::Paid)
    }

    /// Database/wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_status_roundtrip() {
        for status in [
            DraftOrderStatus::Draft,
            DraftOrderStatus::PaymentApproved,
            DraftOrderStatus::InProduction,
            DraftOrderStatus::Shipped,
            DraftOrderStatus::Delivered,
            DraftOrderStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<DraftOrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_payment_confirmation_never_regresses() {
        assert!(DraftOrderStatus::Draft.accepts_payment_confirmation());
        assert!(DraftOrderStatus::PaymentApproved.accepts_payment_confirmation());
        assert!(!DraftOrderStatus::Shipped.accepts_payment_confirmation());
        assert!(!DraftOrderStatus::Canceled.accepts_payment_confirmation());

        assert!(OrderStatus::Paid.accepts_payment_confirmation());
        assert!(!OrderStatus::Delivered.accepts_payment_confirmation());
    }

    #[test]
    fn test_order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
        assert!("pending".parse::<OrderStatus>().is_err());
    }
}
