//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod draft_order;
pub mod order;

pub use draft_order::DraftOrder;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, PaymentDetails};
