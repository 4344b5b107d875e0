//! Catalog products as seen by the cart.

use rust_decimal::Decimal;
use serde::Deserialize;

use abc_shop_core::{ProductId, ProductStatus};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    /// First product image, if any.
    pub image_url: Option<String>,
    /// `None` when stock is not tracked.
    pub stock_quantity: Option<i32>,
    pub status: ProductStatus,
}

impl Product {
    /// Price charged per unit: `price`, or `original_price` when `price` is
    /// zero, or zero.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        if self.price.is_zero() {
            self.original_price.unwrap_or_default()
        } else {
            self.price
        }
    }

    /// Untracked stock counts as in stock.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock_quantity.is_none_or(|quantity| quantity > 0)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// A product to insert or overwrite, as read from a seed file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub status: ProductStatus,
}

impl From<NewProduct> for Product {
    fn from(new: NewProduct) -> Self {
        Self {
            id: new.id,
            name: new.name,
            price: new.price,
            original_price: new.original_price,
            image_url: new.image_url,
            stock_quantity: new.stock_quantity,
            status: new.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, original: Option<i64>, stock: Option<i32>) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Tee".to_string(),
            price: Decimal::new(price, 0),
            original_price: original.map(|p| Decimal::new(p, 0)),
            image_url: None,
            stock_quantity: stock,
            status: ProductStatus::Active,
        }
    }

    #[test]
    fn test_unit_price_falls_back_to_original() {
        assert_eq!(product(100, Some(150), None).unit_price(), Decimal::new(100, 0));
        assert_eq!(product(0, Some(150), None).unit_price(), Decimal::new(150, 0));
        assert_eq!(product(0, None, None).unit_price(), Decimal::ZERO);
    }

    #[test]
    fn test_in_stock() {
        assert!(product(1, None, None).in_stock());
        assert!(product(1, None, Some(3)).in_stock());
        assert!(!product(1, None, Some(0)).in_stock());
    }
}
