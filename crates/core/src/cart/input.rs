//! Cart request payloads.
//!
//! Browser clients send loosely-typed JSON: quantities as numbers or strings,
//! colors as plain strings or `{ "name", "value" }` swatch objects. The types
//! here accept those shapes and expose normalized accessors so handlers never
//! deal with the raw variants.

use serde::{Deserialize, Deserializer, Serialize};

use super::selection::{Selection, normalize_field};
use crate::types::{CartLineId, ProductId, VariantId};

/// Wrapper for every mutating cart request: `{ "item": { ... } }`.
///
/// `item` is optional at the type level so a missing payload is reported as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ItemEnvelope<T> {
    #[serde(default = "Option::default")]
    pub item: Option<T>,
}

impl<T> ItemEnvelope<T> {
    pub const fn new(item: T) -> Self {
        Self { item: Some(item) }
    }
}

/// An integer sent as a JSON number, float, or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseInt {
    /// Parse the leading integer, ignoring any trailing garbage.
    ///
    /// Floats are truncated toward zero; `"12abc"` parses as 12; strings with
    /// no leading digits yield `None`.
    #[must_use]
    pub fn parse(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)] // NaN and infinities are filtered first
            Self::Float(v) => v.is_finite().then(|| v.trunc() as i64),
            Self::Text(s) => parse_leading_int(s),
        }
    }
}

impl From<i32> for LooseInt {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, s.get(1..)?),
        Some(b'+') => (false, s.get(1..)?),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits.get(..end)?.parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

fn clamp_to_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Quantity for an add: defaults to 1, and anything unparseable or below 1
/// becomes 1.
#[must_use]
pub fn add_quantity(input: Option<&LooseInt>) -> i32 {
    input
        .and_then(LooseInt::parse)
        .map(clamp_to_i32)
        .filter(|q| *q >= 1)
        .unwrap_or(1)
}

/// Quantity for an update: unparseable becomes 0 and negatives floor at 0.
#[must_use]
pub fn update_quantity(input: &LooseInt) -> i32 {
    input.parse().map_or(0, |q| clamp_to_i32(q).max(0))
}

/// A color sent either as a plain string or as a swatch object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorInput {
    Text(String),
    Swatch {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        value: Option<String>,
    },
}

impl ColorInput {
    /// The color as a plain string: the text itself, or the swatch name,
    /// falling back to the swatch value.
    #[must_use]
    pub fn normalized(&self) -> Option<String> {
        match self {
            Self::Text(text) => normalize_field(Some(text)),
            Self::Swatch { name, value } => {
                normalize_field(name.as_deref()).or_else(|| normalize_field(value.as_deref()))
            }
        }
    }
}

impl From<&str> for ColorInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// `POST /api/cart/add` item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<LooseInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<ColorInput>,
}

impl AddItemRequest {
    #[must_use]
    pub fn selection(&self) -> Selection {
        Selection {
            size: normalize_field(self.selected_size.as_deref()),
            color: self.selected_color.as_ref().and_then(ColorInput::normalized),
        }
    }

    #[must_use]
    pub fn quantity(&self) -> i32 {
        add_quantity(self.quantity.as_ref())
    }
}

/// `POST /api/cart/remove` item.
///
/// With `id`, exactly that line is removed. Otherwise `productId` is required
/// and the optional fields narrow which of the product's lines match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CartLineId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<ColorInput>,
}

/// `POST /api/cart/update` item.
///
/// `selectedSize` / `selectedColor` distinguish "absent" (leave unchanged)
/// from `null` (clear).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CartLineId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<LooseInt>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_size: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_color: Option<Option<ColorInput>>,
}

impl UpdateItemRequest {
    /// New size: `None` to leave unchanged, `Some(None)` to clear.
    #[must_use]
    pub fn size_change(&self) -> Option<Option<String>> {
        self.selected_size
            .as_ref()
            .map(|size| normalize_field(size.as_deref()))
    }

    /// New color: `None` to leave unchanged, `Some(None)` to clear.
    #[must_use]
    pub fn color_change(&self) -> Option<Option<String>> {
        self.selected_color
            .as_ref()
            .map(|color| color.as_ref().and_then(ColorInput::normalized))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_loose_int_parsing() {
        assert_eq!(LooseInt::Int(3).parse(), Some(3));
        assert_eq!(LooseInt::Float(2.9).parse(), Some(2));
        assert_eq!(LooseInt::Text(" 12abc".into()).parse(), Some(12));
        assert_eq!(LooseInt::Text("-4".into()).parse(), Some(-4));
        assert_eq!(LooseInt::Text("abc".into()).parse(), None);
        assert_eq!(LooseInt::Text("-".into()).parse(), None);
        assert_eq!(LooseInt::Float(f64::NAN).parse(), None);
    }

    #[test]
    fn test_add_quantity_floors_at_one() {
        assert_eq!(add_quantity(None), 1);
        assert_eq!(add_quantity(Some(&LooseInt::Int(0))), 1);
        assert_eq!(add_quantity(Some(&LooseInt::Int(-3))), 1);
        assert_eq!(add_quantity(Some(&LooseInt::Text("x".into()))), 1);
        assert_eq!(add_quantity(Some(&LooseInt::Text("4".into()))), 4);
    }

    #[test]
    fn test_update_quantity_floors_at_zero() {
        assert_eq!(update_quantity(&LooseInt::Int(-2)), 0);
        assert_eq!(update_quantity(&LooseInt::Text("nope".into())), 0);
        assert_eq!(update_quantity(&LooseInt::Int(5)), 5);
    }

    #[test]
    fn test_color_shapes() {
        let text: ColorInput = serde_json::from_value(json!("Red")).unwrap();
        assert_eq!(text.normalized().as_deref(), Some("Red"));

        let named: ColorInput = serde_json::from_value(json!({"name": "Navy", "value": "#001"})).unwrap();
        assert_eq!(named.normalized().as_deref(), Some("Navy"));

        let valued: ColorInput = serde_json::from_value(json!({"value": "#001"})).unwrap();
        assert_eq!(valued.normalized().as_deref(), Some("#001"));

        let empty: ColorInput = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.normalized(), None);
    }

    #[test]
    fn test_add_request_from_browser_payload() {
        let envelope: ItemEnvelope<AddItemRequest> = serde_json::from_value(json!({
            "item": {
                "productId": "12",
                "name": "ignored",
                "price": 100000,
                "quantity": "2",
                "selectedSize": "M",
                "selectedColor": {"name": "Red"}
            }
        }))
        .unwrap();
        let item = envelope.item.unwrap();
        assert_eq!(item.product_id, Some(ProductId::new(12)));
        assert_eq!(item.quantity(), 2);
        assert_eq!(item.selection(), Selection::new(Some("M"), Some("Red")));
    }

    #[test]
    fn test_missing_item_is_none() {
        let envelope: ItemEnvelope<AddItemRequest> = serde_json::from_value(json!({})).unwrap();
        assert!(envelope.item.is_none());
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let cleared: UpdateItemRequest =
            serde_json::from_value(json!({"id": 1, "selectedSize": null})).unwrap();
        assert_eq!(cleared.size_change(), Some(None));
        assert_eq!(cleared.color_change(), None);

        let set: UpdateItemRequest =
            serde_json::from_value(json!({"id": 1, "selectedColor": "Blue"})).unwrap();
        assert_eq!(set.color_change(), Some(Some("Blue".to_string())));
        assert_eq!(set.size_change(), None);
    }
}
