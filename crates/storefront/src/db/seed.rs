//! Load catalog products from YAML.
//!
//! ## YAML Format
//!
//! ```yaml
//! products:
//!   - id: 1
//!     name: "Linen Shirt"
//!     price: 299000
//!     original_price: 349000
//!     image_url: "https://cdn.example.com/linen.jpg"
//!     stock_quantity: 12
//!   - id: 2
//!     name: "Old Season Tee"
//!     price: 99000
//!     status: archived
//! ```
//!
//! `status` defaults to `active`; omitted `stock_quantity` means untracked.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::{ProductCatalog, RepositoryError};
use crate::models::NewProduct;

/// Errors while loading a product seed.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid seed: {0}")]
    Invalid(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Full seed file structure.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub products: Vec<NewProduct>,
}

impl ProductSeed {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` for malformed YAML and `SeedError::Invalid`
    /// when [`ProductSeed::validate`] fails.
    pub fn from_yaml(content: &str) -> Result<Self, SeedError> {
        let seed: Self = serde_yaml::from_str(content)?;
        seed.validate()?;
        Ok(seed)
    }

    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Io` if the file cannot be read, otherwise as
    /// [`ProductSeed::from_yaml`].
    pub async fn from_file(path: &Path) -> Result<Self, SeedError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml(&content)
    }

    /// Reject duplicate ids, blank names and negative prices.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Invalid` naming the first offending product.
    pub fn validate(&self) -> Result<(), SeedError> {
        let mut seen = HashSet::new();
        for product in &self.products {
            if !seen.insert(product.id) {
                return Err(SeedError::Invalid(format!("duplicate product id {}", product.id)));
            }
            if product.name.trim().is_empty() {
                return Err(SeedError::Invalid(format!("product {} has no name", product.id)));
            }
            if product.price < Decimal::ZERO
                || product.original_price.is_some_and(|p| p < Decimal::ZERO)
            {
                return Err(SeedError::Invalid(format!(
                    "product {} has a negative price",
                    product.id
                )));
            }
        }
        Ok(())
    }
}

/// Result of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    /// Products inserted or overwritten.
    pub upserted: usize,
    /// Products that failed, with the error message.
    pub errors: Vec<(String, String)>,
}

/// Write every product of `seed` to the catalog.
///
/// Failures are collected per product rather than aborting the run.
#[instrument(skip(catalog, seed), fields(products = seed.products.len()))]
pub async fn seed_products(catalog: &dyn ProductCatalog, seed: &ProductSeed) -> SeedResult {
    let mut result = SeedResult::default();
    for product in &seed.products {
        match catalog.upsert_product(product).await {
            Ok(_) => result.upserted += 1,
            Err(e) => {
                warn!(product_id = %product.id, error = %e, "Failed to seed product");
                result.errors.push((product.id.to_string(), e.to_string()));
            }
        }
    }
    info!(upserted = result.upserted, failed = result.errors.len(), "Product seed applied");
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use abc_shop_core::{ProductId, ProductStatus};

    use super::*;
    use crate::db::MemoryStore;

    const SEED: &str = r#"
products:
  - id: 1
    name: "Linen Shirt"
    price: 299000
    original_price: "349000"
    stock_quantity: 12
  - id: 2
    name: "Old Season Tee"
    price: 99000.5
    status: archived
"#;

    #[test]
    fn test_parse_seed() {
        let seed = ProductSeed::from_yaml(SEED).unwrap();
        assert_eq!(seed.products.len(), 2);
        assert_eq!(seed.products[0].status, ProductStatus::Active);
        assert_eq!(seed.products[0].original_price, Some(Decimal::new(349_000, 0)));
        assert_eq!(seed.products[1].status, ProductStatus::Archived);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = "products:\n  - {id: 1, name: A, price: 1}\n  - {id: 1, name: B, price: 2}\n";
        assert!(matches!(
            ProductSeed::from_yaml(yaml),
            Err(SeedError::Invalid(_))
        ));
    }

    #[test]
    fn test_blank_name_rejected() {
        let yaml = "products:\n  - {id: 1, name: '  ', price: 1}\n";
        assert!(matches!(
            ProductSeed::from_yaml(yaml),
            Err(SeedError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_into_memory_catalog() {
        let store = MemoryStore::new();
        let seed = ProductSeed::from_yaml(SEED).unwrap();

        let result = seed_products(&store, &seed).await;

        assert_eq!(result.upserted, 2);
        assert!(result.errors.is_empty());
        assert!(store.active_product(ProductId::new(1)).await.unwrap().is_some());
        assert!(store.active_product(ProductId::new(2)).await.unwrap().is_none());
    }
}
