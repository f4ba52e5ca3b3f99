//! Business logic services for storefront.
//!
//! # Services
//!
//! - `checkout` - Open a Stripe checkout session for a cart or a draft order
//! - `reconcile` - Apply verified Stripe events to orders and draft orders

pub mod checkout;
pub mod reconcile;

pub use checkout::create_checkout;
pub use reconcile::{PaymentLedger, PgPaymentLedger, ReconcileError, ReconcileOutcome, reconcile};
