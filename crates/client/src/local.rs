//! Carts kept in key/value storage.
//!
//! Lines are matched by their equality key (product + size + color); there
//! are no line ids. Storage failures are logged and the in-memory result is
//! still returned, so a full disk degrades to a cart that is not persisted.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use abc_shop_core::{CartItemView, CartView};

use crate::error::CartClientError;
use crate::item::{ItemUpdate, NormalizedItem};
use crate::repository::CartRepository;
use crate::storage::{KeyValueStorage, load_cart, save_cart};

/// A cart stored under one key.
#[derive(Clone)]
pub struct LocalCartRepository {
    storage: Arc<dyn KeyValueStorage>,
    key: &'static str,
}

impl LocalCartRepository {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: &'static str) -> Self {
        Self { storage, key }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// The stored cart, empty if missing or unreadable.
    #[must_use]
    pub fn load(&self) -> CartView {
        load_cart(self.storage.as_ref(), self.key)
    }

    /// Overwrite the stored cart, e.g. with the server's latest copy.
    pub fn replace(&self, cart: &CartView) {
        save_cart(self.storage.as_ref(), self.key, cart);
    }

    fn commit(&self, items: Vec<CartItemView>) -> CartView {
        let cart = CartView::from_items(items);
        self.replace(&cart);
        cart
    }
}

#[async_trait]
impl CartRepository for LocalCartRepository {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self) -> Result<CartView, CartClientError> {
        Ok(self.load())
    }

    async fn add(&self, item: &NormalizedItem) -> Result<CartView, CartClientError> {
        let mut items = self.load().items;
        let key = item.key();

        if let Some(existing) = items.iter_mut().find(|i| i.key() == key) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            debug!(key = %key, quantity = existing.quantity, "Merged into local cart line");
        } else {
            items.push(item.to_view());
            debug!(key = %key, "Added local cart line");
        }

        Ok(self.commit(items))
    }

    async fn remove(&self, item: &CartItemView) -> Result<CartView, CartClientError> {
        let mut items = self.load().items;
        let key = item.key();
        items.retain(|i| i.key() != key);
        Ok(self.commit(items))
    }

    async fn update(
        &self,
        item: &CartItemView,
        update: &ItemUpdate,
    ) -> Result<CartView, CartClientError> {
        let cart = self.load();
        let mut items = cart.items.clone();
        let Some(pos) = items.iter().position(|i| i.key() == item.key()) else {
            debug!(key = %item.key(), "Update for unknown local line ignored");
            return Ok(cart);
        };

        let updated = update.apply(&items.remove(pos));
        if updated.quantity == 0 {
            debug!(key = %updated.key(), "Removed local line with zero quantity");
        } else if let Some(other) = items.iter_mut().find(|i| i.key() == updated.key()) {
            other.quantity = other.quantity.saturating_add(updated.quantity);
            debug!(key = %updated.key(), "Folded local line into existing selection");
        } else {
            items.insert(pos, updated);
        }

        Ok(self.commit(items))
    }

    async fn clear(&self) -> Result<CartView, CartClientError> {
        Ok(self.commit(Vec::new()))
    }
}
