//! Terminal shopping cart.
//!
//! Drives the same `CartStore` and `CheckoutOrchestrator` the browser uses,
//! with the cart file standing in for local storage and the storefront API
//! answering product, coupon, shipping and checkout calls.
//!
//! # Usage
//!
//! ```bash
//! colando cart add 12
//! colando cart add 12 --design-url https://cdn.example/art.png --text "Ana"
//! colando cart coupon BEMVINDO10
//! colando cart shipping 01310-100
//! colando cart checkout
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;

use colando_core::cart::{CartError, CartProduct, CartStore, Customization};
use colando_core::checkout::{CheckoutError, CheckoutOrchestrator, CheckoutSource};
use colando_core::coupon::CouponError;
use colando_core::shipping::{
    ShippingError, ShippingOption, ShippingQuoteRequest, normalize_postal_code, rank_options,
};
use colando_core::{CartItemId, DraftOrderId, Price, ProductId, UserId};

use crate::client::{ApiClient, ApiError};
use crate::storage::{CartSession, FileStorage};

#[derive(Debug, Error)]
pub enum CartCommandError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Shipping(#[from] ShippingError),

    #[error("Storefront error: {0}")]
    Api(#[from] ApiError),

    #[error("Session file error: {0}")]
    Session(#[from] std::io::Error),

    #[error("No cart line {0}")]
    UnknownItem(String),

    #[error("No shipping option {0} for this address")]
    UnknownOption(i64),

    #[error("No carrier delivers to this address")]
    NoShippingOptions,

    #[error("Draft order {0} has no product to pay for")]
    EmptyDraft(DraftOrderId),
}

/// Where the cart lives and which storefront it talks to.
#[derive(Debug, Clone)]
pub struct CartContext {
    pub cart_file: PathBuf,
    pub api: ApiClient,
}

struct OpenCart {
    store: CartStore<FileStorage>,
    session: CartSession,
    storage: FileStorage,
}

impl CartContext {
    fn open(&self) -> Result<OpenCart, CartCommandError> {
        let storage = FileStorage::new(&self.cart_file);
        tracing::debug!(path = %storage.path().display(), "Opening cart");
        let session = storage.load_session()?;
        let mut store = CartStore::load(storage.clone())?;
        if let Some(option) = session.shipping.clone() {
            store.select_shipping(option);
        }
        Ok(OpenCart {
            store,
            session,
            storage,
        })
    }

    /// Re-apply the saved coupon. A coupon that has stopped being valid is
    /// dropped from the session with a warning.
    async fn restore_coupon(&self, cart: &mut OpenCart) -> Result<(), CartCommandError> {
        let Some(code) = cart.session.coupon_code.clone() else {
            return Ok(());
        };
        match cart.store.apply_coupon(&code, &self.api, Utc::now()).await {
            Ok(_) => Ok(()),
            Err(err @ CouponError::Lookup(_)) => Err(err.into()),
            Err(err) => {
                tracing::warn!(%code, error = %err, "Saved coupon no longer applies");
                cart.session.coupon_code = None;
                cart.storage.save_session(&cart.session)?;
                Ok(())
            }
        }
    }
}

impl OpenCart {
    /// Item changes make the selected shipping quote stale.
    fn drop_shipping(&mut self) -> Result<(), CartCommandError> {
        if self.session.shipping.take().is_some() {
            self.store.clear_shipping();
            self.storage.save_session(&self.session)?;
            tracing::info!("Cart changed; run `colando cart shipping` again for a new quote");
        }
        Ok(())
    }

    fn require_item(&self, id: &CartItemId) -> Result<u32, CartCommandError> {
        self.store
            .items()
            .iter()
            .find(|item| &item.cart_item_id == id)
            .map(|item| item.quantity)
            .ok_or_else(|| CartCommandError::UnknownItem(id.to_string()))
    }
}

/// Print the cart with its totals.
pub async fn show(ctx: &CartContext) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    ctx.restore_coupon(&mut cart).await?;
    print_summary(&cart.store);
    Ok(())
}

/// Add `quantity` units of a catalog product.
pub async fn add(
    ctx: &CartContext,
    product_id: i32,
    customization: Option<Customization>,
    quantity: u32,
) -> Result<(), CartCommandError> {
    let product = ctx.api.product(ProductId::new(product_id)).await?;
    let mut cart = ctx.open()?;

    let id = cart
        .store
        .add_to_cart(&CartProduct::from(&product), customization)?;
    if quantity > 1 {
        let current = cart.require_item(&id)?;
        cart.store
            .update_quantity(&id, i64::from(current) + i64::from(quantity) - 1)?;
    }
    cart.drop_shipping()?;

    tracing::info!(cart_item_id = %id, product = %product.name, "Added to cart");
    print_summary(&cart.store);
    Ok(())
}

/// Set a line's quantity. Zero or less removes the line.
pub fn set_quantity(ctx: &CartContext, item: &str, quantity: i64) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    let id = CartItemId::from(item);
    cart.require_item(&id)?;
    cart.store.update_quantity(&id, quantity)?;
    cart.drop_shipping()?;
    print_summary(&cart.store);
    Ok(())
}

pub fn remove(ctx: &CartContext, item: &str) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    let id = CartItemId::from(item);
    cart.require_item(&id)?;
    cart.store.remove_from_cart(&id)?;
    cart.drop_shipping()?;
    print_summary(&cart.store);
    Ok(())
}

/// Empty the cart and forget the coupon and shipping choice.
pub fn clear(ctx: &CartContext) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    cart.store.clear_cart()?;
    cart.storage.save_session(&CartSession::default())?;
    tracing::info!("Cart cleared");
    Ok(())
}

/// Apply a coupon code, replacing any coupon already applied.
pub async fn apply_coupon(ctx: &CartContext, code: &str) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    let coupon = cart.store.apply_coupon(code, &ctx.api, Utc::now()).await?;
    let applied = coupon.code.to_string();

    cart.session.coupon_code = Some(applied.clone());
    cart.storage.save_session(&cart.session)?;

    tracing::info!(code = %applied, "Coupon applied");
    print_summary(&cart.store);
    Ok(())
}

pub fn remove_coupon(ctx: &CartContext) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    cart.store.remove_coupon();
    cart.session.coupon_code = None;
    cart.storage.save_session(&cart.session)?;
    print_summary(&cart.store);
    Ok(())
}

/// Quote shipping to `postal_code` and select an option, the cheapest unless
/// `option_id` names another.
pub async fn shipping(
    ctx: &CartContext,
    postal_code: &str,
    option_id: Option<i64>,
) -> Result<(), CartCommandError> {
    let mut cart = ctx.open()?;
    if cart.store.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }

    let request = ShippingQuoteRequest {
        to_postal_code: postal_code.to_string(),
        products: cart.store.parcels(),
    }
    .validated()?;
    let quotes = ctx.api.quote_shipping(&request).await?;
    let options = rank_options(&quotes);

    #[allow(clippy::print_stdout)]
    {
        for option in &options {
            println!("{}", format_option(option));
        }
    }

    let chosen = pick_option(&options, option_id)?;
    tracing::info!(option = chosen.id, carrier = %chosen.carrier, "Shipping selected");

    cart.store.select_shipping(chosen.clone());
    cart.session.postal_code = Some(normalize_postal_code(postal_code)?);
    cart.session.shipping = Some(chosen);
    cart.storage.save_session(&cart.session)?;

    ctx.restore_coupon(&mut cart).await?;
    print_summary(&cart.store);
    Ok(())
}

/// Open a checkout session for the cart, or for a draft order when `draft`
/// is given, and print the payment URL.
pub async fn checkout(
    ctx: &CartContext,
    draft: Option<DraftOrderId>,
    user: Option<UserId>,
) -> Result<(), CartCommandError> {
    let orchestrator = CheckoutOrchestrator::new(ctx.api.clone());

    let redirect = if let Some(id) = draft {
        let view = ctx.api.draft_order(id).await?;
        if view.product.is_none() {
            return Err(CartCommandError::EmptyDraft(id));
        }
        orchestrator
            .submit(CheckoutSource::DraftOrder(&view), user)
            .await?
    } else {
        let mut cart = ctx.open()?;
        ctx.restore_coupon(&mut cart).await?;
        print_summary(&cart.store);
        orchestrator
            .submit(CheckoutSource::Cart(cart.store.items()), user)
            .await?
    };

    tracing::info!(session_id = %redirect.session_id, "Checkout session created");
    #[allow(clippy::print_stdout)]
    {
        println!("{}", redirect.url);
    }
    Ok(())
}

fn pick_option(
    options: &[ShippingOption],
    option_id: Option<i64>,
) -> Result<ShippingOption, CartCommandError> {
    match option_id {
        Some(id) => options
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(CartCommandError::UnknownOption(id)),
        None => options
            .first()
            .cloned()
            .ok_or(CartCommandError::NoShippingOptions),
    }
}

fn format_option(option: &ShippingOption) -> String {
    let days = option
        .delivery_days
        .map_or_else(String::new, |d| format!("  {d} business day(s)"));
    format!(
        "[{:>3}] {:<12} {:<20} {:>12}{days}",
        option.id,
        option.carrier,
        option.name,
        Price::brl(option.price).display()
    )
}

fn render_summary(store: &CartStore<FileStorage>) -> String {
    if store.is_empty() {
        return "Your cart is empty\n".to_string();
    }

    let mut out = String::new();
    for item in store.items() {
        let _ = writeln!(
            out,
            "{:<36} {:<28} {:>3} x {:>12} = {:>12}",
            item.cart_item_id,
            item.name,
            item.quantity,
            Price::brl(item.price).display(),
            Price::brl(item.line_total()).display(),
        );
        if let Some(custom) = &item.customization {
            for (label, value) in [
                ("design", &custom.design_url),
                ("theme", &custom.theme_name),
                ("text", &custom.text),
            ] {
                if let Some(value) = value {
                    let _ = writeln!(out, "    {label}: {value}");
                }
            }
        }
    }

    let _ = writeln!(out, "{:>80}", format!("Subtotal {}", Price::brl(store.subtotal())));
    if let Some(coupon) = store.applied_coupon() {
        let _ = writeln!(
            out,
            "{:>80}",
            format!("Coupon {} -{}", coupon.code, Price::brl(store.discount()))
        );
    }
    if let Some(option) = store.selected_shipping() {
        let _ = writeln!(
            out,
            "{:>80}",
            format!(
                "Shipping ({} {}) {}",
                option.carrier,
                option.name,
                Price::brl(store.shipping_cost())
            )
        );
    }
    let _ = writeln!(out, "{:>80}", format!("Total {}", Price::brl(store.amount_due())));
    out
}

#[allow(clippy::print_stdout)]
fn print_summary(store: &CartStore<FileStorage>) {
    print!("{}", render_summary(store));
}
