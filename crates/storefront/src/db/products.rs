//! `PostgreSQL` product catalog.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use abc_shop_core::{ProductId, ProductStatus};

use super::{ProductCatalog, RepositoryError};
use crate::models::{NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "id, name, price, original_price, image_url, stock_quantity, status";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Decimal,
    original_price: Option<Decimal>,
    image_url: Option<String>,
    stock_quantity: Option<i32>,
    status: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let status: ProductStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            original_price: row.original_price,
            image_url: row.image_url,
            stock_quantity: row.stock_quantity,
            status,
        })
    }
}

/// Products in `storefront.product`.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for ProductRepository {
    async fn active_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1 AND status = 'active'"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn active_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product \
             WHERE id = ANY($1) AND status = 'active'"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO storefront.product
                (id, name, price, original_price, image_url, stock_quantity, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                original_price = EXCLUDED.original_price,
                image_url = EXCLUDED.image_url,
                stock_quantity = EXCLUDED.stock_quantity,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(product.id.as_i32())
            .bind(&product.name)
            .bind(product.price)
            .bind(product.original_price)
            .bind(product.image_url.as_deref())
            .bind(product.stock_quantity)
            .bind(product.status.as_str())
            .fetch_one(&self.pool)
            .await?;

        Product::try_from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_corrupt() {
        let row = ProductRow {
            id: 1,
            name: "Tee".to_string(),
            price: Decimal::ONE,
            original_price: None,
            image_url: None,
            stock_quantity: None,
            status: "deleted".to_string(),
        };
        assert!(matches!(
            Product::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
