//! Checkout session creation.

use tracing::{info, instrument, warn};

use colando_core::DraftOrderStatus;
use colando_core::checkout::{
    CheckoutError, CheckoutLine, CheckoutRedirect, CheckoutRequest, DraftOrderView,
    validate_lines,
};

use crate::db::{DraftOrderRepository, OrderRepository};
use crate::error::{AppError, add_breadcrumb};
use crate::models::NewOrder;
use crate::state::AppState;
use crate::stripe::SessionRequest;

/// Path the customer returns to after paying.
pub const SUCCESS_PATH: &str = "/pagamento/sucesso";
/// Path the customer returns to after abandoning the payment page.
pub const CANCEL_PATH: &str = "/pagamento/cancelado";

/// Open a hosted checkout session.
///
/// Draft-order checkouts pay for the draft's product as stored, whatever
/// lines the client sent, and are tied to the draft through session metadata.
/// Cart checkouts are recorded as an order awaiting payment, keyed by the
/// session id; if that record cannot be written the session is expired again.
///
/// # Errors
///
/// `Checkout` for an unusable item list, `NotFound` for an unknown draft,
/// `Conflict` for a draft that is no longer awaiting payment, `Stripe` when
/// the session cannot be created, `Database` when recording fails.
#[instrument(skip(state, request), fields(items = request.cart_items.len(), draft = ?request.draft_order_id))]
pub async fn create_checkout(
    state: &AppState,
    request: &CheckoutRequest,
) -> Result<CheckoutRedirect, AppError> {
    let lines = match request.draft_order_id {
        Some(draft_id) => {
            let draft = DraftOrderRepository::new(state.pool())
                .get_view(draft_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Draft order".to_string()))?;
            draft_lines(&draft)?
        }
        None => request.cart_items.clone(),
    };
    validate_lines(&lines)?;

    let config = state.config();
    let session = state
        .stripe()
        .create_checkout_session(&SessionRequest {
            lines: &lines,
            user_id: request.user_id,
            draft_order_id: request.draft_order_id,
            success_url: config.site_url(SUCCESS_PATH),
            cancel_url: config.site_url(CANCEL_PATH),
        })
        .await?;

    let url = session
        .url
        .ok_or_else(|| AppError::Internal("checkout session has no URL".to_string()))?;

    if request.draft_order_id.is_none() {
        let order = NewOrder::from_lines(&lines, request.user_id, session.id.clone());
        match OrderRepository::new(state.pool()).create_pending(&order).await {
            Ok(order_id) => {
                info!(%order_id, session_id = %session.id, total = %order.total(), "Order awaiting payment");
            }
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "Order not recorded, expiring session");
                if let Err(expire_err) = state.stripe().expire_checkout_session(&session.id).await {
                    warn!(session_id = %session.id, error = %expire_err, "Session left open");
                }
                return Err(err.into());
            }
        }
    }

    add_breadcrumb("checkout", "Session created", Some(&[("session_id", session.id.as_str())]));

    Ok(CheckoutRedirect {
        session_id: session.id,
        url,
    })
}

/// The line a draft order pays for, built from its stored product.
///
/// # Errors
///
/// `Conflict` once the draft has left `draft`, `Checkout(EmptyCart)` when the
/// draft's product is gone.
pub fn draft_lines(draft: &DraftOrderView) -> Result<Vec<CheckoutLine>, AppError> {
    if draft.status != DraftOrderStatus::Draft {
        return Err(AppError::Conflict(format!(
            "Draft order is already {}",
            draft.status
        )));
    }
    let line = draft.checkout_line().ok_or(CheckoutError::EmptyCart)?;
    Ok(vec![line])
}
