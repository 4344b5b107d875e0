//! Cart views returned by the API and cached by clients.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::selection::{LineKey, Selection};
use crate::types::{CartLineId, ProductId, VariantId};

/// Price of `quantity` units.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Money as a plain JSON number: whole amounts are written as integers
/// (`0`, `1500`), anything else as a float. Both forms are read back.
mod json_number {
    use rust_decimal::Decimal;
    use rust_decimal::prelude::ToPrimitive;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        match value.fract().is_zero().then(|| value.to_i64()).flatten() {
            Some(whole) => serializer.serialize_i64(whole),
            None => rust_decimal::serde::float::serialize(value, serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        rust_decimal::serde::float::deserialize(deserializer)
    }

    pub mod option {
        use rust_decimal::Decimal;
        use serde::{Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            value: &Option<Decimal>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Decimal>, D::Error> {
            rust_decimal::serde::float_option::deserialize(deserializer)
        }
    }
}

/// One denormalized cart line.
///
/// `id` is the server-side line id; lines that only exist in a client's local
/// cache have none. `size`/`color` mirror `selectedSize`/`selectedColor` for
/// older consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    #[serde(default)]
    pub id: Option<CartLineId>,
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, with = "json_number")]
    pub price: Decimal,
    #[serde(default, with = "json_number::option")]
    pub original_price: Option<Decimal>,
    pub quantity: i32,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

impl CartItemView {
    #[must_use]
    pub fn selection(&self) -> Selection {
        Selection::new(self.selected_size.as_deref(), self.selected_color.as_deref())
    }

    /// Equality key used when merging local lines.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id, self.selection())
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.price, self.quantity)
    }
}

/// A cart: its lines, the number of lines, and the sum of line totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    #[serde(default)]
    pub items: Vec<CartItemView>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, with = "json_number")]
    pub total: Decimal,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cart from its lines, computing `count` and `total`.
    #[must_use]
    pub fn from_items(items: Vec<CartItemView>) -> Self {
        let total = items.iter().map(CartItemView::line_total).sum();
        Self {
            count: items.len(),
            items,
            total,
        }
    }

    /// Fill in `count` and `total` when the producer left them zeroed.
    ///
    /// Locally cached carts are stored as `{ "items": [...] }` only; a zero is
    /// treated as "not supplied".
    #[must_use]
    pub fn enriched(mut self) -> Self {
        if self.count == 0 {
            self.count = self.items.len();
        }
        if self.total.is_zero() {
            self.total = self.items.iter().map(CartItemView::line_total).sum();
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by its merge key.
    #[must_use]
    pub fn find(&self, key: &LineKey) -> Option<&CartItemView> {
        self.items.iter().find(|item| &item.key() == key)
    }
}

/// Response envelope: `{ "cart": { ... } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEnvelope {
    pub cart: CartView,
}

/// Error response body: `{ "message": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
