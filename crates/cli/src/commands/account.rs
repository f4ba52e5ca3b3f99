//! Customer account commands: wishlist and order history.
//!
//! # Usage
//!
//! ```bash
//! export COLANDO_USER_ID=<uuid>
//! colando wishlist show
//! colando wishlist toggle 12
//! colando history list
//! colando history show 42
//! ```

use std::fmt::Write as _;

use thiserror::Error;

use colando_core::wishlist::{Wishlist, WishlistChange};
use colando_core::{OrderId, Price, ProductId, UserId};
use colando_storefront::models::Order;

use crate::client::{ApiClient, ApiError};

#[derive(Debug, Error)]
pub enum AccountCommandError {
    #[error("Storefront error: {0}")]
    Api(#[from] ApiError),

    #[error("Order {0} belongs to another customer")]
    ForeignOrder(OrderId),
}

/// Print the saved products.
pub async fn show_wishlist(api: &ApiClient, user: UserId) -> Result<(), AccountCommandError> {
    let wishlist = Wishlist::from_products(api.wishlist(user).await?);

    #[allow(clippy::print_stdout)]
    {
        for product in wishlist.products() {
            println!(
                "{:>6}  {:<40} {}",
                product.id.as_i32(),
                product.name,
                Price::brl(product.price)
            );
        }
        println!("{} saved product(s)", wishlist.len());
    }
    Ok(())
}

pub async fn add_to_wishlist(
    api: &ApiClient,
    user: UserId,
    product: i32,
) -> Result<(), AccountCommandError> {
    api.add_to_wishlist(user, ProductId::new(product)).await?;
    tracing::info!(product, "Saved to wishlist");
    Ok(())
}

pub async fn remove_from_wishlist(
    api: &ApiClient,
    user: UserId,
    product: i32,
) -> Result<(), AccountCommandError> {
    api.remove_from_wishlist(user, ProductId::new(product)).await?;
    tracing::info!(product, "Removed from wishlist");
    Ok(())
}

/// Save the product if it is not saved yet, forget it otherwise.
pub async fn toggle_wishlist(
    api: &ApiClient,
    user: UserId,
    product: i32,
) -> Result<(), AccountCommandError> {
    let product = api.product(ProductId::new(product)).await?;
    let mut wishlist = Wishlist::from_products(api.wishlist(user).await?);

    match wishlist.toggle(&product) {
        WishlistChange::Added(id) => {
            api.add_to_wishlist(user, id).await?;
            tracing::info!(product = %id, name = %product.name, "Saved to wishlist");
        }
        WishlistChange::Removed(id) => {
            api.remove_from_wishlist(user, id).await?;
            tracing::info!(product = %id, name = %product.name, "Removed from wishlist");
        }
    }
    Ok(())
}

/// Print a customer's orders, newest first.
pub async fn list_orders(api: &ApiClient, user: UserId) -> Result<(), AccountCommandError> {
    let orders = api.orders_for(user).await?;

    #[allow(clippy::print_stdout)]
    {
        for order in &orders {
            println!(
                "#{:<6} {:<17} {:>14}  {}",
                order.id.as_i32(),
                order.status,
                Price::brl(order.total),
                order.created_at.format("%d/%m/%Y"),
            );
        }
        println!("{} order(s)", orders.len());
    }
    Ok(())
}

/// Print one of the customer's orders with its items.
pub async fn show_order(
    api: &ApiClient,
    user: UserId,
    id: i32,
) -> Result<(), AccountCommandError> {
    let id = OrderId::new(id);
    let order = api.order(id).await?;
    if order.user_id != Some(user) {
        return Err(AccountCommandError::ForeignOrder(id));
    }

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_order(&order));
    }
    Ok(())
}

fn render_order(order: &Order) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Pedido #{} - {} - {}",
        order.id.as_i32(),
        order.status,
        order.created_at.format("%d/%m/%Y %H:%M")
    );
    for item in &order.items {
        let _ = writeln!(
            out,
            "  {} x {:<36} {}",
            item.quantity,
            item.name,
            Price::brl(item.price)
        );
    }
    let _ = writeln!(out, "  Total: {}", Price::brl(order.total));
    if let Some(tracking) = &order.tracking_code {
        let _ = writeln!(out, "  Rastreio: {tracking}");
    }
    out
}
