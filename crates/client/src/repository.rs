//! The seam between the cart store and where carts live.

use async_trait::async_trait;

use abc_shop_core::{CartItemView, CartView};

use crate::error::CartClientError;
use crate::item::{ItemUpdate, NormalizedItem};

/// One place a cart can be read from and written to.
///
/// Every operation returns the cart as it stands afterwards.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<CartView, CartClientError>;

    /// Add `item`, merging with an existing line for the same product,
    /// size and color.
    async fn add(&self, item: &NormalizedItem) -> Result<CartView, CartClientError>;

    async fn remove(&self, item: &CartItemView) -> Result<CartView, CartClientError>;

    async fn update(
        &self,
        item: &CartItemView,
        update: &ItemUpdate,
    ) -> Result<CartView, CartClientError>;

    async fn clear(&self) -> Result<CartView, CartClientError>;
}
