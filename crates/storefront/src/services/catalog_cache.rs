//! Cached product catalog.
//!
//! Wraps any [`ProductCatalog`] with a `moka` cache keyed by product id.
//! Only active products are cached; a product deactivated in the database
//! stays visible to the cart until its entry expires. The storefront only
//! installs it when `STOREFRONT_PRODUCT_CACHE_TTL_SECS` is non-zero.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use abc_shop_core::ProductId;

use crate::db::{ProductCatalog, RepositoryError};
use crate::models::{NewProduct, Product};

const MAX_CACHED_PRODUCTS: u64 = 10_000;

/// Read-through cache in front of a catalog.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn ProductCatalog>,
    cache: Cache<ProductId, Product>,
}

impl CachedCatalog {
    #[must_use]
    pub fn new(inner: Arc<dyn ProductCatalog>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_PRODUCTS)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    /// Drop every cached product.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl ProductCatalog for CachedCatalog {
    async fn active_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.cache.get(&id).await {
            debug!(product_id = %id, "Cache hit for product");
            return Ok(Some(product));
        }

        let product = self.inner.active_product(id).await?;
        if let Some(product) = &product {
            self.cache.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    async fn active_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.cache.get(id).await {
                Some(product) => found.push(product),
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            debug!(hits = found.len(), misses = missing.len(), "Fetching uncached products");
            for product in self.inner.active_products(&missing).await? {
                self.cache.insert(product.id, product.clone()).await;
                found.push(product);
            }
        }
        Ok(found)
    }

    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let stored = self.inner.upsert_product(product).await?;
        self.cache.invalidate(&stored.id).await;
        Ok(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use abc_shop_core::ProductStatus;

    use super::*;
    use crate::db::MemoryStore;

    fn tee(status: ProductStatus) -> NewProduct {
        NewProduct {
            id: ProductId::new(1),
            name: "Tee".to_string(),
            price: Decimal::new(10, 0),
            original_price: None,
            image_url: None,
            stock_quantity: None,
            status,
        }
    }

    #[tokio::test]
    async fn test_upsert_invalidates_entry() {
        let store = Arc::new(MemoryStore::with_products([tee(ProductStatus::Active)]));
        let cached = CachedCatalog::new(store, Duration::from_secs(60));

        assert!(cached.active_product(ProductId::new(1)).await.unwrap().is_some());
        cached.upsert_product(&tee(ProductStatus::Draft)).await.unwrap();
        assert!(cached.active_product(ProductId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_mixes_hits_and_misses() {
        let store = Arc::new(MemoryStore::with_products([tee(ProductStatus::Active)]));
        let cached = CachedCatalog::new(store, Duration::from_secs(60));

        cached.active_product(ProductId::new(1)).await.unwrap();
        let found = cached
            .active_products(&[ProductId::new(1), ProductId::new(99)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
