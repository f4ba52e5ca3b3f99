//! Cart orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use colando_core::checkout::CheckoutLine;
use colando_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId, round_money};

/// A cart order with its items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub stripe_session_id: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub tracking_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// One line of an order, priced as it was at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    /// Current catalog image of the product, if it still exists.
    #[serde(default)]
    pub image: Option<String>,
}

/// An order about to be recorded for a new checkout session.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub stripe_session_id: String,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Build from the lines sent to the payment processor.
    #[must_use]
    pub fn from_lines(
        lines: &[CheckoutLine],
        user_id: Option<UserId>,
        stripe_session_id: String,
    ) -> Self {
        Self {
            user_id,
            stripe_session_id,
            items: lines.iter().map(NewOrderItem::from).collect(),
        }
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| round_money(item.price.saturating_mul(Decimal::from(item.quantity))))
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    /// Set when the line id is a catalog product id; customized lines carry
    /// a synthetic id and are stored by name only.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<&CheckoutLine> for NewOrderItem {
    fn from(line: &CheckoutLine) -> Self {
        Self {
            product_id: line.id.parse().ok(),
            name: line.name.clone(),
            quantity: i32::try_from(line.quantity).unwrap_or(i32::MAX),
            price: line.price,
        }
    }
}

/// What the payment processor tells us about a completed payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentDetails {
    pub session_id: String,
    pub address: Option<serde_json::Value>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, price: &str, quantity: u32) -> CheckoutLine {
        CheckoutLine {
            id: id.to_owned(),
            name: format!("item {id}"),
            price: price.parse().unwrap(),
            quantity,
            image: None,
        }
    }

    #[test]
    fn test_new_order_from_lines() {
        let custom_id = uuid::Uuid::new_v4().to_string();
        let order = NewOrder::from_lines(
            &[line("12", "19.90", 2), line(&custom_id, "45.00", 1)],
            None,
            "cs_test_1".to_owned(),
        );

        assert_eq!(order.items[0].product_id, Some(ProductId::new(12)));
        assert_eq!(order.items[1].product_id, None);
        assert_eq!(order.total(), "84.80".parse::<Decimal>().unwrap());
    }
}
