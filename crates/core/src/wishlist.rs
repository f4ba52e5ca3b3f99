//! Saved products.
//!
//! The storefront keeps each customer's wishlist. [`Wishlist`] mirrors it on
//! the client so membership is answered without a request, and
//! [`Wishlist::toggle`] tells the caller which request to send.

use serde::{Deserialize, Serialize};

use crate::types::{Product, ProductId};

/// Body of `POST /api/users/{id}/wishlist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistAdd {
    pub product_id: ProductId,
}

/// What a toggle did to the local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistChange {
    Added(ProductId),
    Removed(ProductId),
}

/// A customer's saved products, in the order the storefront returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wishlist {
    products: Vec<Product>,
}

impl Wishlist {
    /// Wrap the list served by `GET /api/users/{id}/wishlist`, dropping
    /// repeated products.
    #[must_use]
    pub fn from_products(products: Vec<Product>) -> Self {
        let mut wishlist = Self::default();
        for product in products {
            if !wishlist.contains(product.id) {
                wishlist.products.push(product);
            }
        }
        wishlist
    }

    #[must_use]
    pub fn contains(&self, id: ProductId) -> bool {
        self.products.iter().any(|p| p.id == id)
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Remove `product` if saved, otherwise append it.
    pub fn toggle(&mut self, product: &Product) -> WishlistChange {
        if self.contains(product.id) {
            self.products.retain(|p| p.id != product.id);
            WishlistChange::Removed(product.id)
        } else {
            self.products.push(product.clone());
            WishlistChange::Added(product.id)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Adesivo {id}"),
            description: String::new(),
            price: "9.90".parse().unwrap(),
            original_price: None,
            image: String::new(),
            additional_images: Vec::new(),
            category_id: None,
            category_name: None,
        }
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut wishlist = Wishlist::default();

        assert_eq!(
            wishlist.toggle(&product(4)),
            WishlistChange::Added(ProductId::new(4))
        );
        assert!(wishlist.contains(ProductId::new(4)));

        assert_eq!(
            wishlist.toggle(&product(4)),
            WishlistChange::Removed(ProductId::new(4))
        );
        assert!(wishlist.is_empty());
    }

    #[test]
    fn test_from_products_keeps_order_without_repeats() {
        let wishlist = Wishlist::from_products(vec![product(3), product(1), product(3)]);

        let ids: Vec<i32> = wishlist.products().iter().map(|p| p.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(wishlist.len(), 2);
    }

    #[test]
    fn test_add_body_shape() {
        let body: WishlistAdd = serde_json::from_str(r#"{"product_id": 12}"#).unwrap();
        assert_eq!(body.product_id, ProductId::new(12));
        assert!(serde_json::from_str::<WishlistAdd>(r#"{"product_id": "x"}"#).is_err());
    }
}
