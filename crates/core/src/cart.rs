//! The shopping cart.
//!
//! [`CartStore`] owns one customer's line items, the coupon applied to them
//! and the selected shipping option. Every item mutation writes the whole item
//! list to a [`CartStorage`] slot as a JSON array. The coupon and the shipping
//! choice are session state and are not persisted.
//!
//! Money reads (`subtotal`, `discount`, `total_price`, `shipping_cost`,
//! `amount_due`) are derived from current state on every call.

use std::io;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkout::CheckoutLine;
use crate::coupon::{Coupon, CouponError, CouponSource, resolve_coupon};
use crate::shipping::{Parcel, ShippingOption};
use crate::types::{CartItemId, Product, ProductId, round_money};

/// Cart persistence failures.
#[derive(Debug, Error)]
pub enum CartError {
    /// The stored cart could not be parsed.
    #[error("stored cart is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// Reading or writing the storage slot failed.
    #[error("cart storage error: {0}")]
    Storage(#[from] io::Error),
}

/// A slot holding the serialized cart.
pub trait CartStorage {
    /// Raw stored value, `None` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Underlying I/O failure.
    fn load(&self) -> io::Result<Option<String>>;

    /// Replace the stored value.
    ///
    /// # Errors
    ///
    /// Underlying I/O failure.
    fn save(&mut self, value: &str) -> io::Result<()>;
}

/// In-process storage, for tests and short-lived sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    value: Option<String>,
}

impl MemoryStorage {
    /// Storage pre-filled with `value`.
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// What was last saved.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.value.clone())
    }

    fn save(&mut self, value: &str) -> io::Result<()> {
        self.value = Some(value.to_owned());
        Ok(())
    }
}

/// Personalization attached to a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The product fields a cart line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Decimal,
}

impl From<&Product> for CartProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price,
        }
    }
}

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
}

impl CartItem {
    /// New line with quantity one.
    #[must_use]
    pub fn from_product(product: &CartProduct, customization: Option<Customization>) -> Self {
        let cart_item_id = if customization.is_some() {
            CartItemId::custom()
        } else {
            CartItemId::for_product(product.id)
        };
        Self {
            cart_item_id,
            product_id: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price,
            quantity: 1,
            customization,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.price.saturating_mul(Decimal::from(self.quantity)))
    }
}

/// One customer's cart.
#[derive(Debug)]
pub struct CartStore<S> {
    storage: S,
    items: Vec<CartItem>,
    coupon: Option<Coupon>,
    shipping: Option<ShippingOption>,
}

impl<S: CartStorage> CartStore<S> {
    /// Open the cart held in `storage`, or an empty one if nothing is stored.
    ///
    /// # Errors
    ///
    /// `Corrupt` when the stored value is not a valid item list, `Storage` when
    /// the slot cannot be read.
    pub fn load(storage: S) -> Result<Self, CartError> {
        let items = match storage.load()? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(CartError::Corrupt)?
            }
            _ => Vec::new(),
        };
        Ok(Self {
            storage,
            items,
            coupon: None,
            shipping: None,
        })
    }

    /// Give the storage back, dropping session state.
    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of `product`.
    ///
    /// Plain adds bump the existing plain line for the product; customized adds
    /// always open a new line.
    ///
    /// # Errors
    ///
    /// Storage failure while persisting.
    pub fn add_to_cart(
        &mut self,
        product: &CartProduct,
        customization: Option<Customization>,
    ) -> Result<CartItemId, CartError> {
        let plain_id = CartItemId::for_product(product.id);
        let existing = customization.is_none().then(|| {
            self.items
                .iter_mut()
                .find(|item| item.customization.is_none() && item.cart_item_id == plain_id)
        });

        let id = if let Some(Some(item)) = existing {
            item.quantity = item.quantity.saturating_add(1);
            item.cart_item_id.clone()
        } else {
            let item = CartItem::from_product(product, customization);
            let id = item.cart_item_id.clone();
            self.items.push(item);
            id
        };

        self.persist()?;
        Ok(id)
    }

    /// Drop the line with `id`. Absent ids are ignored.
    ///
    /// # Errors
    ///
    /// Storage failure while persisting.
    pub fn remove_from_cart(&mut self, id: &CartItemId) -> Result<(), CartError> {
        self.items.retain(|item| &item.cart_item_id != id);
        self.persist()
    }

    /// Set a line's quantity; zero or less removes it.
    ///
    /// # Errors
    ///
    /// Storage failure while persisting.
    pub fn update_quantity(&mut self, id: &CartItemId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_from_cart(id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self.items.iter_mut().find(|item| &item.cart_item_id == id) {
            item.quantity = quantity;
        }
        self.persist()
    }

    /// Remove every line. The applied coupon stays.
    ///
    /// # Errors
    ///
    /// Storage failure while persisting.
    pub fn clear_cart(&mut self) -> Result<(), CartError> {
        self.items.clear();
        self.persist()
    }

    /// Total number of units.
    pub fn cart_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(CartItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Look up `code` and make it the cart's only coupon.
    ///
    /// On failure the previously applied coupon, if any, is kept.
    ///
    /// # Errors
    ///
    /// See [`resolve_coupon`].
    pub async fn apply_coupon<C: CouponSource + Sync>(
        &mut self,
        code: &str,
        source: &C,
        now: DateTime<Utc>,
    ) -> Result<&Coupon, CouponError> {
        let coupon = resolve_coupon(source, code, now).await?;
        Ok(self.coupon.insert(coupon))
    }

    pub fn remove_coupon(&mut self) {
        self.coupon = None;
    }

    pub const fn applied_coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Discount from the applied coupon on the current subtotal.
    pub fn discount(&self) -> Decimal {
        self.coupon
            .as_ref()
            .map_or(Decimal::ZERO, |coupon| coupon.discount_for(self.subtotal()))
    }

    /// Subtotal minus discount.
    pub fn total_price(&self) -> Decimal {
        self.subtotal() - self.discount()
    }

    pub fn select_shipping(&mut self, option: ShippingOption) {
        self.shipping = Some(option);
    }

    pub fn clear_shipping(&mut self) {
        self.shipping = None;
    }

    pub const fn selected_shipping(&self) -> Option<&ShippingOption> {
        self.shipping.as_ref()
    }

    /// Cost of the selected option, zero when none is selected or a
    /// free-shipping coupon is applied.
    pub fn shipping_cost(&self) -> Decimal {
        let waived = self.coupon.as_ref().is_some_and(Coupon::waives_shipping);
        match &self.shipping {
            Some(option) if !waived => option.price,
            _ => Decimal::ZERO,
        }
    }

    /// What the customer pays: items after discount plus shipping.
    pub fn amount_due(&self) -> Decimal {
        self.total_price().saturating_add(self.shipping_cost())
    }

    pub fn checkout_lines(&self) -> Vec<CheckoutLine> {
        self.items.iter().map(CheckoutLine::from).collect()
    }

    /// Default parcels for a shipping quote, one per line.
    pub fn parcels(&self) -> Vec<Parcel> {
        self.items
            .iter()
            .map(|item| Parcel::for_line(item.price, item.quantity))
            .collect()
    }

    fn persist(&mut self) -> Result<(), CartError> {
        let raw = serde_json::to_string(&self.items)
            .map_err(|e| CartError::Storage(io::Error::other(e)))?;
        self.storage.save(&raw)?;
        Ok(())
    }
}
