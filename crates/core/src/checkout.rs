//! Checkout orchestration.
//!
//! Turns either the cart or a single draft order into a list of payable lines
//! and asks a [`CheckoutBackend`] for a hosted checkout session. Only one
//! submission may be pending at a time per orchestrator.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartItem;
use crate::types::{DraftOrderId, DraftOrderStatus, ProductId, UserId, max_money};

/// Checkout failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("A checkout is already in progress")]
    InFlight,

    #[error("Invalid item {id}: {reason}")]
    InvalidItem { id: String, reason: &'static str },

    #[error("Checkout failed: {0}")]
    Backend(String),
}

/// A payable line as sent to the checkout-session endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&CartItem> for CheckoutLine {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.cart_item_id.to_string(),
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
            image: Some(item.image.clone()).filter(|i| !i.is_empty()),
        }
    }
}

/// Body of `POST /api/checkout/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub cart_items: Vec<CheckoutLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_order_id: Option<DraftOrderId>,
}

/// Where to send the customer to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
}

/// Product fields embedded in a draft-order read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftProduct {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
}

/// A draft order joined with its product, as the storefront serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrderView {
    pub id: DraftOrderId,
    pub product_id: Option<ProductId>,
    pub personalization_type: String,
    pub status: DraftOrderStatus,
    #[serde(default)]
    pub product: Option<DraftProduct>,
}

impl DraftOrderView {
    /// The single line a draft order pays for, if it has a product.
    #[must_use]
    pub fn checkout_line(&self) -> Option<CheckoutLine> {
        let product = self.product.as_ref()?;
        Some(CheckoutLine {
            id: self
                .product_id
                .map_or_else(|| self.id.to_string(), |p| p.to_string()),
            name: product.name.clone(),
            price: product.price,
            quantity: 1,
            image: product.image.clone(),
        })
    }
}

/// What is being paid for.
#[derive(Debug, Clone, Copy)]
pub enum CheckoutSource<'a> {
    Cart(&'a [CartItem]),
    DraftOrder(&'a DraftOrderView),
}

impl CheckoutSource<'_> {
    /// Resolve to payable lines. A draft without a product yields nothing.
    #[must_use]
    pub fn lines(&self) -> Vec<CheckoutLine> {
        match self {
            Self::Cart(items) => items.iter().map(CheckoutLine::from).collect(),
            Self::DraftOrder(draft) => draft.checkout_line().into_iter().collect(),
        }
    }

    fn draft_order_id(&self) -> Option<DraftOrderId> {
        match self {
            Self::Cart(_) => None,
            Self::DraftOrder(draft) => Some(draft.id),
        }
    }
}

/// Check the lines a session is about to be created for.
///
/// # Errors
///
/// `EmptyCart` for no lines, `InvalidItem` for a zero quantity, a negative
/// price or an amount beyond what an order can record ([`max_money`]).
pub fn validate_lines(lines: &[CheckoutLine]) -> Result<(), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let ceiling = max_money();
    let mut total = Decimal::ZERO;
    for line in lines {
        if line.quantity == 0 {
            return Err(CheckoutError::InvalidItem {
                id: line.id.clone(),
                reason: "quantity must be positive",
            });
        }
        if line.price < Decimal::ZERO {
            return Err(CheckoutError::InvalidItem {
                id: line.id.clone(),
                reason: "price cannot be negative",
            });
        }
        if line.price > ceiling {
            return Err(CheckoutError::InvalidItem {
                id: line.id.clone(),
                reason: "price is too large",
            });
        }
        total = line
            .price
            .checked_mul(Decimal::from(line.quantity))
            .and_then(|amount| total.checked_add(amount))
            .filter(|total| *total <= ceiling)
            .ok_or_else(|| CheckoutError::InvalidItem {
                id: line.id.clone(),
                reason: "order total is too large",
            })?;
        if line.name.trim().is_empty() {
            return Err(CheckoutError::InvalidItem {
                id: line.id.clone(),
                reason: "name is required",
            });
        }
    }
    Ok(())
}

/// Something that can open a hosted checkout session.
pub trait CheckoutBackend {
    type Error: std::fmt::Display;

    fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> impl Future<Output = Result<CheckoutRedirect, Self::Error>> + Send;
}

/// Drives one customer's checkout submissions.
#[derive(Debug)]
pub struct CheckoutOrchestrator<B> {
    backend: B,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: CheckoutBackend + Sync> CheckoutOrchestrator<B> {
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            in_flight: AtomicBool::new(false),
        }
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether a submission is pending.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Create a checkout session for `source`.
    ///
    /// Fails with `EmptyCart` before any backend call when nothing is payable,
    /// and with `InFlight` when another submission has not finished. The
    /// caller's cart is never touched.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`].
    pub async fn submit(
        &self,
        source: CheckoutSource<'_>,
        user_id: Option<UserId>,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        let cart_items = source.lines();
        if cart_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CheckoutError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let request = CheckoutRequest {
            cart_items,
            user_id,
            draft_order_id: source.draft_order_id(),
        };

        self.backend
            .create_session(&request)
            .await
            .map_err(|e| CheckoutError::Backend(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use super::*;
    use crate::cart::{CartProduct, CartStore, MemoryStorage};

    #[derive(Default)]
    struct RecordingBackend {
        calls: AtomicUsize,
        last: Mutex<Option<CheckoutRequest>>,
        fail: bool,
    }

    impl CheckoutBackend for RecordingBackend {
        type Error = String;

        async fn create_session(
            &self,
            request: &CheckoutRequest,
        ) -> Result<CheckoutRedirect, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            if self.fail {
                return Err("card processor unavailable".to_owned());
            }
            Ok(CheckoutRedirect {
                session_id: "cs_test_1".to_owned(),
                url: "https://checkout.stripe.com/c/pay/cs_test_1".to_owned(),
            })
        }
    }

    struct BlockingBackend {
        release: Notify,
        entered: Notify,
    }

    impl CheckoutBackend for BlockingBackend {
        type Error = String;

        async fn create_session(&self, _: &CheckoutRequest) -> Result<CheckoutRedirect, String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(CheckoutRedirect {
                session_id: "cs_slow".to_owned(),
                url: "https://example.test/slow".to_owned(),
            })
        }
    }

    fn product(id: i32, price: &str) -> CartProduct {
        CartProduct {
            id: ProductId::new(id),
            name: format!("Adesivo {id}"),
            image: format!("https://cdn.test/{id}.png"),
            price: price.parse().unwrap(),
        }
    }

    fn draft(product: Option<DraftProduct>) -> DraftOrderView {
        DraftOrderView {
            id: DraftOrderId::generate(),
            product_id: Some(ProductId::new(9)),
            personalization_type: "custom_sticker".to_owned(),
            status: DraftOrderStatus::Draft,
            product,
        }
    }

    #[tokio::test]
    async fn test_empty_cart_makes_no_request() {
        let orchestrator = CheckoutOrchestrator::new(RecordingBackend::default());
        let result = orchestrator.submit(CheckoutSource::Cart(&[]), None).await;
        assert_eq!(result, Err(CheckoutError::EmptyCart));
        assert_eq!(orchestrator.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_draft_without_product_is_empty() {
        let orchestrator = CheckoutOrchestrator::new(RecordingBackend::default());
        let view = draft(None);
        let result = orchestrator
            .submit(CheckoutSource::DraftOrder(&view), None)
            .await;
        assert_eq!(result, Err(CheckoutError::EmptyCart));
        assert_eq!(orchestrator.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cart_submission_sends_lines() {
        let mut store = CartStore::load(MemoryStorage::default()).unwrap();
        store.add_to_cart(&product(1, "10.00"), None).unwrap();
        store.add_to_cart(&product(1, "10.00"), None).unwrap();

        let orchestrator = CheckoutOrchestrator::new(RecordingBackend::default());
        let user = UserId::generate();
        let redirect = orchestrator
            .submit(CheckoutSource::Cart(store.items()), Some(user))
            .await
            .unwrap();
        assert_eq!(redirect.session_id, "cs_test_1");

        let sent = orchestrator.backend().last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.cart_items.len(), 1);
        assert_eq!(sent.cart_items[0].quantity, 2);
        assert_eq!(sent.user_id, Some(user));
        assert_eq!(sent.draft_order_id, None);
        assert!(!orchestrator.is_submitting());
    }

    #[tokio::test]
    async fn test_draft_submission_is_single_line() {
        let orchestrator = CheckoutOrchestrator::new(RecordingBackend::default());
        let view = draft(Some(DraftProduct {
            name: "Quadro personalizado".to_owned(),
            price: "89.90".parse().unwrap(),
            image: None,
        }));
        orchestrator
            .submit(CheckoutSource::DraftOrder(&view), None)
            .await
            .unwrap();

        let sent = orchestrator.backend().last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.draft_order_id, Some(view.id));
        assert_eq!(sent.cart_items.len(), 1);
        assert_eq!(sent.cart_items[0].quantity, 1);
        assert_eq!(sent.cart_items[0].id, "9");
    }

    #[tokio::test]
    async fn test_backend_failure_resets_guard() {
        let orchestrator = CheckoutOrchestrator::new(RecordingBackend {
            fail: true,
            ..Default::default()
        });
        let items = [CartItem::from_product(&product(2, "5.00"), None)];
        let err = orchestrator
            .submit(CheckoutSource::Cart(&items), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Backend(msg) if msg.contains("unavailable")));
        assert!(!orchestrator.is_submitting());
    }

    #[tokio::test]
    async fn test_second_submit_while_pending_is_rejected() {
        let orchestrator = CheckoutOrchestrator::new(BlockingBackend {
            release: Notify::new(),
            entered: Notify::new(),
        });
        let items = [CartItem::from_product(&product(3, "7.50"), None)];

        let first = orchestrator.submit(CheckoutSource::Cart(&items), None);
        let second = async {
            orchestrator.backend().entered.notified().await;
            let result = orchestrator.submit(CheckoutSource::Cart(&items), None).await;
            orchestrator.backend().release.notify_one();
            result
        };

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap().session_id, "cs_slow");
        assert_eq!(second, Err(CheckoutError::InFlight));
        assert!(!orchestrator.is_submitting());
    }

    #[test]
    fn test_validate_lines() {
        assert_eq!(validate_lines(&[]), Err(CheckoutError::EmptyCart));

        let mut line = CheckoutLine {
            id: "1".to_owned(),
            name: "Adesivo".to_owned(),
            price: Decimal::ONE,
            quantity: 1,
            image: None,
        };
        assert!(validate_lines(std::slice::from_ref(&line)).is_ok());

        line.quantity = 0;
        assert!(matches!(
            validate_lines(std::slice::from_ref(&line)),
            Err(CheckoutError::InvalidItem { .. })
        ));

        line.quantity = 1;
        line.price = Decimal::NEGATIVE_ONE;
        assert!(matches!(
            validate_lines(std::slice::from_ref(&line)),
            Err(CheckoutError::InvalidItem { .. })
        ));

        line.price = Decimal::MAX;
        assert_eq!(
            validate_lines(std::slice::from_ref(&line)),
            Err(CheckoutError::InvalidItem {
                id: "1".to_owned(),
                reason: "price is too large",
            })
        );
    }

    #[test]
    fn test_validate_lines_bounds_the_order_total() {
        let line = CheckoutLine {
            id: "12".to_owned(),
            name: "Painel".to_owned(),
            price: max_money(),
            quantity: 1,
            image: None,
        };
        assert!(validate_lines(std::slice::from_ref(&line)).is_ok());

        let doubled = CheckoutLine {
            quantity: 2,
            ..line.clone()
        };
        assert_eq!(
            validate_lines(&[doubled]),
            Err(CheckoutError::InvalidItem {
                id: "12".to_owned(),
                reason: "order total is too large",
            })
        );

        let many = CheckoutLine {
            quantity: u32::MAX,
            ..line.clone()
        };
        assert!(validate_lines(&[many]).is_err());
        assert!(validate_lines(&[line.clone(), line]).is_err());
    }
}
