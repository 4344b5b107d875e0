//! Normalization of loosely shaped cart item payloads.
//!
//! Product listings, detail pages and older carts describe the same item
//! with different field names. [`CartItemInput`] accepts all of them and
//! [`CartItemInput::normalize`] picks the first populated alternative:
//!
//! | Field    | Alternatives (in order)                   |
//! |----------|-------------------------------------------|
//! | product  | `id`, `productId`, `_id`                  |
//! | name     | `name`, `title`                           |
//! | price    | `salePrice`, `price`, `originalPrice`     |
//! | quantity | `quantity`, `qty` (default 1)             |
//! | size     | `selectedSize`, `size`                    |
//! | color    | `selectedColor`, `color` (string or `{ name, value }`) |
//! | image    | `image`, first of `images`                |

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use abc_shop_core::{
    AddItemRequest, CartItemView, CartLineId, ColorInput, LineKey, LooseInt, ProductId,
    Selection, UpdateItemRequest, VariantId, add_quantity, normalize_field,
};

use crate::error::CartClientError;

/// An item as callers describe it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemInput {
    #[serde(default)]
    pub id: Option<LooseInt>,
    #[serde(default)]
    pub product_id: Option<LooseInt>,
    #[serde(default, rename = "_id")]
    pub legacy_id: Option<LooseInt>,
    #[serde(default)]
    pub variant_id: Option<LooseInt>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sale_price: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub original_price: Option<Value>,
    #[serde(default)]
    pub quantity: Option<LooseInt>,
    #[serde(default)]
    pub qty: Option<LooseInt>,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<ColorInput>,
    #[serde(default)]
    pub color: Option<ColorInput>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// An item in the one shape the store works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub quantity: i32,
    pub selection: Selection,
    pub image: Option<String>,
}

fn positive_id(value: Option<&LooseInt>) -> Option<i32> {
    value
        .and_then(LooseInt::parse)
        .and_then(|v| i32::try_from(v).ok())
        .filter(|v| *v > 0)
}

fn price_of(value: Option<&Value>) -> Option<Decimal> {
    let price = match value? {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    price.filter(|p| !p.is_zero())
}

fn nonzero(value: Option<&LooseInt>) -> Option<&LooseInt> {
    value.filter(|q| q.parse().is_some_and(|v| v != 0))
}

impl CartItemInput {
    /// Input naming only a product.
    #[must_use]
    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(LooseInt::from(product_id.as_i32())),
            ..Self::default()
        }
    }

    /// Resolve the alternatives into a [`NormalizedItem`].
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::InvalidItem` if no product id is present.
    pub fn normalize(&self) -> Result<NormalizedItem, CartClientError> {
        let product_id = positive_id(self.id.as_ref())
            .or_else(|| positive_id(self.product_id.as_ref()))
            .or_else(|| positive_id(self.legacy_id.as_ref()))
            .map(ProductId::new)
            .ok_or_else(|| CartClientError::InvalidItem("no product id".to_string()))?;

        let name = normalize_field(self.name.as_deref())
            .or_else(|| normalize_field(self.title.as_deref()))
            .unwrap_or_default();

        let original_price = price_of(self.original_price.as_ref());
        let price = price_of(self.sale_price.as_ref())
            .or_else(|| price_of(self.price.as_ref()))
            .or(original_price)
            .unwrap_or_default();

        let quantity = add_quantity(nonzero(self.quantity.as_ref()).or(self.qty.as_ref()));

        let size = normalize_field(self.selected_size.as_deref())
            .or_else(|| normalize_field(self.size.as_deref()));
        let color = self
            .selected_color
            .as_ref()
            .and_then(ColorInput::normalized)
            .or_else(|| self.color.as_ref().and_then(ColorInput::normalized));

        let image = normalize_field(self.image.as_deref())
            .or_else(|| self.images.first().and_then(|i| normalize_field(Some(i))));

        Ok(NormalizedItem {
            product_id,
            variant_id: positive_id(self.variant_id.as_ref()).map(VariantId::new),
            name,
            price,
            original_price,
            quantity,
            selection: Selection { size, color },
            image,
        })
    }
}

impl NormalizedItem {
    /// Local merge key: product + size + color.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id, self.selection.clone())
    }

    /// Payload for `POST /api/cart/add`.
    #[must_use]
    pub fn to_request(&self) -> AddItemRequest {
        AddItemRequest {
            product_id: Some(self.product_id),
            variant_id: self.variant_id,
            quantity: Some(LooseInt::from(self.quantity)),
            selected_size: self.selection.size.clone(),
            selected_color: self.selection.color.as_deref().map(ColorInput::from),
        }
    }

    /// A new local cart line for this item.
    #[must_use]
    pub fn to_view(&self) -> CartItemView {
        CartItemView {
            id: None,
            product_id: self.product_id,
            variant_id: self.variant_id,
            name: self.name.clone(),
            image: self.image.clone(),
            price: self.price,
            original_price: self.original_price,
            quantity: self.quantity,
            selected_size: self.selection.size.clone(),
            selected_color: self.selection.color.clone(),
            size: self.selection.size.clone(),
            color: self.selection.color.clone(),
            in_stock: true,
        }
    }

    /// Re-add an existing cart line elsewhere, e.g. a guest line after sign-in.
    #[must_use]
    pub fn from_view(view: &CartItemView) -> Self {
        Self {
            product_id: view.product_id,
            variant_id: view.variant_id,
            name: view.name.clone(),
            price: view.price,
            original_price: view.original_price,
            quantity: view.quantity.max(1),
            selection: view.selection(),
            image: view.image.clone(),
        }
    }
}

/// Changes to one cart line.
///
/// For size/color, `None` leaves the field alone and `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub quantity: Option<i32>,
    pub size: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

impl ItemUpdate {
    /// Set the quantity only. Zero removes the line.
    #[must_use]
    pub const fn quantity(quantity: i32) -> Self {
        Self {
            quantity: Some(quantity),
            size: None,
            color: None,
        }
    }

    /// Payload for `POST /api/cart/update`.
    #[must_use]
    pub fn to_request(&self, id: CartLineId) -> UpdateItemRequest {
        UpdateItemRequest {
            id: Some(id),
            quantity: self.quantity.map(LooseInt::from),
            selected_size: self.size.clone(),
            selected_color: self
                .color
                .as_ref()
                .map(|c| c.as_deref().map(ColorInput::from)),
        }
    }

    /// `item` after the changes, with the quantity floored at zero.
    #[must_use]
    pub fn apply(&self, item: &CartItemView) -> CartItemView {
        let mut updated = item.clone();
        if let Some(quantity) = self.quantity {
            updated.quantity = quantity.max(0);
        }
        if let Some(size) = &self.size {
            updated.selected_size = normalize_field(size.as_deref());
            updated.size.clone_from(&updated.selected_size);
        }
        if let Some(color) = &self.color {
            updated.selected_color = normalize_field(color.as_deref());
            updated.color.clone_from(&updated.selected_color);
        }
        updated
    }
}
