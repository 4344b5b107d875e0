//! Cart operations scoped to one owner.
//!
//! Every operation takes the caller's [`Owner`] (if any) and the raw request
//! item, validates in the order the API reports errors (payload, then
//! product, then identity), writes through the repositories and returns the
//! freshly read cart.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use abc_shop_core::{
    AddItemRequest, CartItemView, CartView, ColorInput, Owner, ProductId, RemoveItemRequest,
    UpdateItemRequest, update_quantity,
};

use crate::db::{CartLineStore, ProductCatalog, RepositoryError, Storage};
use crate::models::{CartLine, LineChanges, LineFilter, NewCartLine, Product};

/// Attempts at the add upsert before a conflict is reported.
const ADD_ATTEMPTS: usize = 2;

/// Cart operation failures. `Display` is the client-facing message.
#[derive(Debug, Error)]
pub enum CartError {
    /// Mutating call without a user or session.
    #[error("Session missing")]
    MissingIdentity,

    /// Missing item payload or required field.
    #[error("Invalid item")]
    InvalidItem,

    /// Remove without a line id or product id.
    #[error("Need id or productId")]
    MissingTarget,

    /// Product does not exist or is not active.
    #[error("Product not found or unavailable")]
    ProductUnavailable,

    /// No line with that id belongs to the caller.
    #[error("Cart item not found")]
    LineNotFound,

    /// Storage failure.
    #[error("Server error")]
    Repository(#[from] RepositoryError),
}

/// Cart operations over a line store and a catalog.
pub struct CartService<'a> {
    carts: &'a dyn CartLineStore,
    catalog: &'a dyn ProductCatalog,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartLineStore, catalog: &'a dyn ProductCatalog) -> Self {
        Self { carts, catalog }
    }

    #[must_use]
    pub fn from_storage(storage: &'a Storage) -> Self {
        Self::new(storage.carts(), storage.catalog())
    }

    /// The owner's cart, joined against active products.
    ///
    /// Lines whose product is missing or inactive are left out of the items,
    /// `count` and `total`, but stay stored. Without an owner the cart is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a lookup fails.
    #[instrument(skip(self), fields(owner = owner.map(Owner::kind)))]
    pub async fn read(&self, owner: Option<&Owner>) -> Result<CartView, CartError> {
        let Some(owner) = owner else {
            return Ok(CartView::empty());
        };

        let lines = self.carts.lines_for(owner).await?;
        if lines.is_empty() {
            return Ok(CartView::empty());
        }

        let mut ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products: HashMap<ProductId, Product> = self
            .catalog
            .active_products(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let stored = lines.len();
        let items: Vec<CartItemView> = lines
            .iter()
            .filter_map(|line| products.get(&line.product_id).map(|p| item_view(line, p)))
            .collect();
        if items.len() < stored {
            debug!(hidden = stored - items.len(), "Hid cart lines for unavailable products");
        }

        Ok(CartView::from_items(items))
    }

    /// Add a product, merging with the owner's line for the same selection.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidItem` without an item or product id
    /// - `CartError::ProductUnavailable` if the product is missing or inactive
    /// - `CartError::MissingIdentity` without an owner
    /// - `CartError::Repository` if the write still conflicts after a retry
    #[instrument(skip(self, item), fields(owner = owner.map(Owner::kind)))]
    pub async fn add(
        &self,
        owner: Option<&Owner>,
        item: Option<&AddItemRequest>,
    ) -> Result<CartView, CartError> {
        let item = item.ok_or(CartError::InvalidItem)?;
        let product_id = item.product_id.ok_or(CartError::InvalidItem)?;

        if self.catalog.active_product(product_id).await?.is_none() {
            return Err(CartError::ProductUnavailable);
        }
        let owner = owner.ok_or(CartError::MissingIdentity)?;

        let line = NewCartLine {
            owner: owner.clone(),
            product_id,
            variant_id: item.variant_id,
            quantity: item.quantity(),
            selection: item.selection(),
        };

        let mut attempt = 1;
        let stored = loop {
            match self.carts.upsert(&line).await {
                Ok(stored) => break stored,
                Err(RepositoryError::Conflict(reason)) if attempt < ADD_ATTEMPTS => {
                    warn!(%reason, attempt, "Cart line upsert conflicted, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };
        debug!(line_id = %stored.id, quantity = stored.quantity, "Cart line upserted");

        self.read(Some(owner)).await
    }

    /// Remove one line by id, or every line of a product matching the
    /// optional variant/size/color.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidItem` without an item
    /// - `CartError::MissingIdentity` without an owner
    /// - `CartError::MissingTarget` with neither line id nor product id
    #[instrument(skip(self, item), fields(owner = owner.map(Owner::kind)))]
    pub async fn remove(
        &self,
        owner: Option<&Owner>,
        item: Option<&RemoveItemRequest>,
    ) -> Result<CartView, CartError> {
        let item = item.ok_or(CartError::InvalidItem)?;
        let owner = owner.ok_or(CartError::MissingIdentity)?;

        let removed = if let Some(id) = item.id {
            self.carts.delete_line(owner, id).await?
        } else {
            let product_id = item.product_id.ok_or(CartError::MissingTarget)?;
            let color = item
                .selected_color
                .as_ref()
                .and_then(ColorInput::normalized);
            let filter = LineFilter::new(
                product_id,
                item.variant_id,
                item.selected_size.as_deref(),
                color.as_deref(),
            );
            self.carts.delete_matching(owner, &filter).await?
        };
        debug!(removed, "Cart lines removed");

        self.read(Some(owner)).await
    }

    /// Change a line's quantity and/or selection.
    ///
    /// A selection that collides with another of the owner's lines folds the
    /// two together.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidItem` without an item or line id
    /// - `CartError::MissingIdentity` without an owner
    /// - `CartError::LineNotFound` if the owner has no such line
    #[instrument(skip(self, item), fields(owner = owner.map(Owner::kind)))]
    pub async fn update(
        &self,
        owner: Option<&Owner>,
        item: Option<&UpdateItemRequest>,
    ) -> Result<CartView, CartError> {
        let item = item.ok_or(CartError::InvalidItem)?;
        let id = item.id.ok_or(CartError::InvalidItem)?;
        let owner = owner.ok_or(CartError::MissingIdentity)?;

        let changes = LineChanges {
            quantity: item.quantity.as_ref().map(update_quantity),
            size: item.size_change(),
            color: item.color_change(),
        };

        let updated = self
            .carts
            .update_line(owner, id, &changes)
            .await?
            .ok_or(CartError::LineNotFound)?;
        if updated.id != id {
            debug!(line_id = %id, into = %updated.id, "Update folded line into existing selection");
        }

        self.read(Some(owner)).await
    }

    /// Delete all of the owner's lines.
    ///
    /// # Errors
    ///
    /// - `CartError::MissingIdentity` without an owner
    #[instrument(skip(self), fields(owner = owner.map(Owner::kind)))]
    pub async fn clear(&self, owner: Option<&Owner>) -> Result<CartView, CartError> {
        let owner = owner.ok_or(CartError::MissingIdentity)?;
        let removed = self.carts.clear(owner).await?;
        debug!(removed, "Cart cleared");
        Ok(CartView::empty())
    }
}

fn item_view(line: &CartLine, product: &Product) -> CartItemView {
    CartItemView {
        id: Some(line.id),
        product_id: line.product_id,
        variant_id: line.variant_id,
        name: product.name.clone(),
        image: product.image_url.clone(),
        price: product.unit_price(),
        original_price: product.original_price,
        quantity: line.quantity,
        selected_size: line.selection.size.clone(),
        selected_color: line.selection.color.clone(),
        size: line.selection.size.clone(),
        color: line.selection.color.clone(),
        in_stock: product.in_stock(),
    }
}
