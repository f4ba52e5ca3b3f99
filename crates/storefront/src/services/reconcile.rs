//! Payment reconciliation for verified Stripe events.
//!
//! A completed checkout session moves either a draft order
//! (`draft -> payment_approved`, when the session metadata names one) or the
//! cart order recorded for that session (`awaiting_payment -> paid`). Every
//! other event type is acknowledged without touching the database.
//!
//! Deliveries can repeat. The ledger only applies a confirmation while the
//! record still accepts one, so replays end in the same state.

use std::future::Future;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use colando_core::{DraftOrderId, DraftOrderStatus, OrderId, OrderStatus};

use crate::db::{DraftOrderRepository, OrderRepository, RepositoryError};
use crate::models::PaymentDetails;
use crate::stripe::WebhookEvent;
use crate::stripe::webhook::{CHECKOUT_SESSION_COMPLETED, CompletedSession};

/// Where confirmed payments are recorded.
pub trait PaymentLedger {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the draft's status afterwards, `None` if it does not exist.
    fn confirm_draft(
        &self,
        id: DraftOrderId,
        payment: &PaymentDetails,
    ) -> impl Future<Output = Result<Option<DraftOrderStatus>, Self::Error>> + Send;

    /// Returns the matched order and its status afterwards, `None` if no order
    /// was recorded for the session.
    fn confirm_order(
        &self,
        payment: &PaymentDetails,
    ) -> impl Future<Output = Result<Option<(OrderId, OrderStatus)>, Self::Error>> + Send;
}

/// `PaymentLedger` over the storefront database.
#[derive(Clone, Copy)]
pub struct PgPaymentLedger<'a> {
    pool: &'a PgPool,
}

impl<'a> PgPaymentLedger<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl PaymentLedger for PgPaymentLedger<'_> {
    type Error = RepositoryError;

    async fn confirm_draft(
        &self,
        id: DraftOrderId,
        payment: &PaymentDetails,
    ) -> Result<Option<DraftOrderStatus>, RepositoryError> {
        DraftOrderRepository::new(self.pool)
            .confirm_payment(id, payment)
            .await
    }

    async fn confirm_order(
        &self,
        payment: &PaymentDetails,
    ) -> Result<Option<(OrderId, OrderStatus)>, RepositoryError> {
        OrderRepository::new(self.pool).confirm_payment(payment).await
    }
}

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    DraftConfirmed {
        id: DraftOrderId,
        status: DraftOrderStatus,
    },
    DraftNotFound(DraftOrderId),
    /// Metadata named a draft but the value is not a draft id.
    InvalidDraftReference(String),
    OrderConfirmed {
        id: OrderId,
        status: OrderStatus,
    },
    OrderNotFound {
        session_id: String,
    },
    Ignored {
        event_type: String,
    },
}

#[derive(Debug, Error)]
pub enum ReconcileError<E: std::error::Error + 'static> {
    /// The event object is not a checkout session.
    #[error("invalid checkout session payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("failed to record payment: {0}")]
    Ledger(#[source] E),
}

/// Apply a verified event to the ledger.
///
/// # Errors
///
/// `Payload` when a completed-session event cannot be read, `Ledger` when
/// recording the payment fails (the delivery should be retried).
#[instrument(skip(event, ledger), fields(event_id = %event.id, event_type = %event.event_type))]
pub async fn reconcile<L: PaymentLedger + Sync>(
    event: &WebhookEvent,
    ledger: &L,
) -> Result<ReconcileOutcome, ReconcileError<L::Error>> {
    if event.event_type != CHECKOUT_SESSION_COMPLETED {
        return Ok(ReconcileOutcome::Ignored {
            event_type: event.event_type.clone(),
        });
    }

    let session: CompletedSession =
        serde_json::from_value(event.data.object.clone()).map_err(ReconcileError::Payload)?;

    if let Some(reference) = session.draft_order_ref() {
        let Ok(id) = reference.parse::<DraftOrderId>() else {
            warn!(reference, session_id = %session.id, "Session names an invalid draft order id");
            return Ok(ReconcileOutcome::InvalidDraftReference(reference.to_string()));
        };

        let payment = session.draft_payment();
        return match ledger
            .confirm_draft(id, &payment)
            .await
            .map_err(ReconcileError::Ledger)?
        {
            Some(status) => {
                info!(draft_order_id = %id, %status, "Draft order payment recorded");
                Ok(ReconcileOutcome::DraftConfirmed { id, status })
            }
            None => {
                warn!(draft_order_id = %id, "Paid session for unknown draft order");
                Ok(ReconcileOutcome::DraftNotFound(id))
            }
        };
    }

    let payment = session.order_payment();
    match ledger
        .confirm_order(&payment)
        .await
        .map_err(ReconcileError::Ledger)?
    {
        Some((id, status)) => {
            info!(order_id = %id, %status, "Order payment recorded");
            Ok(ReconcileOutcome::OrderConfirmed { id, status })
        }
        None => {
            warn!(session_id = %session.id, "Paid session with no recorded order");
            Ok(ReconcileOutcome::OrderNotFound {
                session_id: session.id,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Debug, Error)]
    #[error("ledger unavailable")]
    struct Unavailable;

    #[derive(Default)]
    struct MemoryLedger {
        drafts: Mutex<HashMap<DraftOrderId, (DraftOrderStatus, Option<PaymentDetails>)>>,
        orders: Mutex<HashMap<String, (OrderId, OrderStatus)>>,
        fail: bool,
    }

    impl PaymentLedger for MemoryLedger {
        type Error = Unavailable;

        async fn confirm_draft(
            &self,
            id: DraftOrderId,
            payment: &PaymentDetails,
        ) -> Result<Option<DraftOrderStatus>, Unavailable> {
            if self.fail {
                return Err(Unavailable);
            }
            let mut drafts = self.drafts.lock().unwrap();
            let Some(entry) = drafts.get_mut(&id) else {
                return Ok(None);
            };
            if entry.0.accepts_payment_confirmation() {
                *entry = (DraftOrderStatus::PaymentApproved, Some(payment.clone()));
            }
            Ok(Some(entry.0))
        }

        async fn confirm_order(
            &self,
            payment: &PaymentDetails,
        ) -> Result<Option<(OrderId, OrderStatus)>, Unavailable> {
            if self.fail {
                return Err(Unavailable);
            }
            let mut orders = self.orders.lock().unwrap();
            let Some(entry) = orders.get_mut(&payment.session_id) else {
                return Ok(None);
            };
            if entry.1.accepts_payment_confirmation() {
                entry.1 = OrderStatus::Paid;
            }
            Ok(Some(*entry))
        }
    }

    fn completed(metadata: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "metadata": metadata,
                "customer_details": {
                    "email": "ana@example.com",
                    "address": { "city": "Aracaju", "postal_code": "49095806" }
                }
            }}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_draft_confirmed_and_replay_is_stable() {
        let id = DraftOrderId::generate();
        let ledger = MemoryLedger::default();
        ledger
            .drafts
            .lock()
            .unwrap()
            .insert(id, (DraftOrderStatus::Draft, None));

        let event = completed(json!({ "draft_order_id": id.to_string() }));
        let first = reconcile(&event, &ledger).await.unwrap();
        let second = reconcile(&event, &ledger).await.unwrap();

        let expected = ReconcileOutcome::DraftConfirmed {
            id,
            status: DraftOrderStatus::PaymentApproved,
        };
        assert_eq!(first, expected);
        assert_eq!(second, expected);

        let drafts = ledger.drafts.lock().unwrap();
        let (_, payment) = &drafts[&id];
        let payment = payment.as_ref().unwrap();
        assert_eq!(payment.session_id, "cs_test_1");
        assert_eq!(payment.address.as_ref().unwrap()["city"], "Aracaju");
    }

    #[tokio::test]
    async fn test_admin_status_not_overwritten() {
        let id = DraftOrderId::generate();
        let ledger = MemoryLedger::default();
        ledger
            .drafts
            .lock()
            .unwrap()
            .insert(id, (DraftOrderStatus::Shipped, None));

        let event = completed(json!({ "draft_order_id": id.to_string() }));
        let outcome = reconcile(&event, &ledger).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::DraftConfirmed {
                id,
                status: DraftOrderStatus::Shipped
            }
        );
    }

    #[tokio::test]
    async fn test_cart_order_matched_by_session() {
        let ledger = MemoryLedger::default();
        ledger.orders.lock().unwrap().insert(
            "cs_test_1".to_string(),
            (OrderId::new(7), OrderStatus::AwaitingPayment),
        );

        let outcome = reconcile(&completed(json!({})), &ledger).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::OrderConfirmed {
                id: OrderId::new(7),
                status: OrderStatus::Paid
            }
        );
    }

    #[tokio::test]
    async fn test_unmatched_references_are_acknowledged() {
        let ledger = MemoryLedger::default();

        let outcome = reconcile(&completed(json!({ "draft_order_id": "42" })), &ledger)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::InvalidDraftReference("42".into()));

        let id = DraftOrderId::generate();
        let outcome = reconcile(&completed(json!({ "draft_order_id": id.to_string() })), &ledger)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::DraftNotFound(id));

        let outcome = reconcile(&completed(json!({})), &ledger).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::OrderNotFound {
                session_id: "cs_test_1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_other_events_ignored() {
        let ledger = MemoryLedger {
            fail: true,
            ..MemoryLedger::default()
        };
        let event: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "payment_intent.created",
            "data": { "object": { "id": "pi_1" } }
        }))
        .unwrap();

        let outcome = reconcile(&event, &ledger).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                event_type: "payment_intent.created".into()
            }
        );
    }

    #[tokio::test]
    async fn test_ledger_failure_surfaces() {
        let ledger = MemoryLedger {
            fail: true,
            ..MemoryLedger::default()
        };
        let event = completed(json!({ "draft_order_id": DraftOrderId::generate().to_string() }));
        assert!(matches!(
            reconcile(&event, &ledger).await,
            Err(ReconcileError::Ledger(Unavailable))
        ));
    }

    #[tokio::test]
    async fn test_bad_session_payload() {
        let ledger = MemoryLedger::default();
        let event: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "data": { "object": { "metadata": "nope" } }
        }))
        .unwrap();
        assert!(matches!(
            reconcile(&event, &ledger).await,
            Err(ReconcileError::Payload(_))
        ));
    }
}
