//! Size/color selection and cart line identity.
//!
//! A cart line is identified by owner + product + [`Selection`]. Absent and
//! blank values both normalize to `None` so that "no size" always matches
//! "no size", which is what the unique index on the server relies on.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Separator used when rendering a [`LineKey`].
pub const KEY_SEPARATOR: &str = "::";

/// Normalize an optional free-text field: trim, and map blank to `None`.
#[must_use]
pub fn normalize_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// A normalized size/color selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub size: Option<String>,
    pub color: Option<String>,
}

impl Selection {
    /// Build a selection, normalizing both fields.
    #[must_use]
    pub fn new(size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            size: normalize_field(size),
            color: normalize_field(color),
        }
    }
}

/// Equality key for merging cart lines: product + size + color.
///
/// Renders as `product::size::color` with empty segments for absent values,
/// e.g. `12::M::Red` or `12::::`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub selection: Selection,
}

impl LineKey {
    #[must_use]
    pub const fn new(product_id: ProductId, selection: Selection) -> Self {
        Self {
            product_id,
            selection,
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.product_id,
            self.selection.size.as_deref().unwrap_or_default(),
            self.selection.color.as_deref().unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_normalize_to_none() {
        assert_eq!(Selection::new(Some("  "), Some("")), Selection::default());
        assert_eq!(
            Selection::new(Some(" M "), None),
            Selection {
                size: Some("M".to_string()),
                color: None
            }
        );
    }

    #[test]
    fn test_line_key_display() {
        let key = LineKey::new(ProductId::new(12), Selection::new(Some("M"), Some("Red")));
        assert_eq!(key.to_string(), "12::M::Red");

        let bare = LineKey::new(ProductId::new(12), Selection::default());
        assert_eq!(bare.to_string(), "12::::");
    }

    #[test]
    fn test_line_key_distinguishes_sizes() {
        let m = LineKey::new(ProductId::new(1), Selection::new(Some("M"), None));
        let l = LineKey::new(ProductId::new(1), Selection::new(Some("L"), None));
        assert_ne!(m, l);
    }
}
