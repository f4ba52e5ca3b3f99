//! Draft (customization) orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use colando_core::{DraftOrderId, DraftOrderStatus, ProductId};

/// A customization order created before checkout.
#[derive(Debug, Clone, Serialize)]
pub struct DraftOrder {
    pub id: DraftOrderId,
    pub product_id: Option<ProductId>,
    /// Kind of personalization requested (free-form tag from the storefront).
    pub personalization_type: String,
    pub status: DraftOrderStatus,
    /// Address captured by the payment processor, as it reported it.
    pub delivery_address: Option<serde_json::Value>,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
