//! Persisted cart lines.

use chrono::{DateTime, Utc};

use abc_shop_core::{CartLineId, Owner, ProductId, Selection, VariantId, normalize_field};

/// One stored line: an owner's quantity of a product in a given size/color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: CartLineId,
    pub owner: Owner,
    pub product_id: ProductId,
    /// Legacy variant reference; recorded on first insert, never part of
    /// line identity.
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub selection: Selection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line to add: inserted if the tuple is new, otherwise its quantity is
/// added to the existing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartLine {
    pub owner: Owner,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub selection: Selection,
}

/// Narrows a product-wide removal. `None` fields do not constrain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFilter {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl LineFilter {
    /// Filter on a product, with optional variant/size/color constraints.
    ///
    /// Blank size/color strings are treated as omitted.
    #[must_use]
    pub fn new(
        product_id: ProductId,
        variant_id: Option<VariantId>,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Self {
        Self {
            product_id,
            variant_id,
            size: normalize_field(size),
            color: normalize_field(color),
        }
    }

    /// Whether `line` is selected by this filter.
    #[must_use]
    pub fn matches(&self, line: &CartLine) -> bool {
        line.product_id == self.product_id
            && self.variant_id.is_none_or(|v| line.variant_id == Some(v))
            && self
                .size
                .as_ref()
                .is_none_or(|s| line.selection.size.as_ref() == Some(s))
            && self
                .color
                .as_ref()
                .is_none_or(|c| line.selection.color.as_ref() == Some(c))
    }
}

/// Changes to apply to an existing line.
///
/// For size/color, `None` leaves the field alone and `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineChanges {
    pub quantity: Option<i32>,
    pub size: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

impl LineChanges {
    /// Quantity and selection of `line` after the changes.
    #[must_use]
    pub fn apply_to(&self, line: &CartLine) -> (i32, Selection) {
        let quantity = self.quantity.unwrap_or(line.quantity);
        let selection = Selection {
            size: self
                .size
                .clone()
                .unwrap_or_else(|| line.selection.size.clone()),
            color: self
                .color
                .clone()
                .unwrap_or_else(|| line.selection.color.clone()),
        };
        (quantity, selection)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.size.is_none() && self.color.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use abc_shop_core::SessionId;

    use super::*;

    fn line(size: Option<&str>, color: Option<&str>) -> CartLine {
        let now = Utc::now();
        CartLine {
            id: CartLineId::new(1),
            owner: Owner::Session(SessionId::parse("guest-1").unwrap()),
            product_id: ProductId::new(7),
            variant_id: Some(VariantId::new(70)),
            quantity: 2,
            selection: Selection::new(size, color),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_omitted_fields_do_not_constrain() {
        let filter = LineFilter::new(ProductId::new(7), None, None, None);
        assert!(filter.matches(&line(Some("M"), Some("Red"))));
        assert!(filter.matches(&line(None, None)));
    }

    #[test]
    fn test_filter_matches_color() {
        let filter = LineFilter::new(ProductId::new(7), None, Some("M"), Some("Red"));
        assert!(filter.matches(&line(Some("M"), Some("Red"))));
        assert!(!filter.matches(&line(Some("M"), Some("Blue"))));
        assert!(!filter.matches(&line(Some("M"), None)));
    }

    #[test]
    fn test_filter_variant_and_product() {
        let wrong_variant = LineFilter::new(ProductId::new(7), Some(VariantId::new(71)), None, None);
        assert!(!wrong_variant.matches(&line(None, None)));
        let wrong_product = LineFilter::new(ProductId::new(8), None, None, None);
        assert!(!wrong_product.matches(&line(None, None)));
    }

    #[test]
    fn test_changes_clear_and_keep() {
        let changes = LineChanges {
            quantity: Some(5),
            size: Some(None),
            color: None,
        };
        let (quantity, selection) = changes.apply_to(&line(Some("M"), Some("Red")));
        assert_eq!(quantity, 5);
        assert_eq!(selection, Selection::new(None, Some("Red")));
        assert!(LineChanges::default().is_empty());
    }
}
