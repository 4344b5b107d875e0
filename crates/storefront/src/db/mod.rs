//! Storage for cart lines, the product catalog and API tokens.
//!
//! # Database: `PostgreSQL`, schema `storefront`
//!
//! ## Tables
//!
//! - `user` - Shoppers that can hold a server-side cart
//! - `api_token` - HMAC digests of bearer tokens
//! - `product` - Catalog rows the cart reads (seeded)
//! - `cart_line` - One row per owner + product + size + color
//!
//! # Backends
//!
//! Every table is reached through a repository trait ([`CartLineStore`],
//! [`ProductCatalog`], [`AccessTokenStore`]) with a `PostgreSQL`
//! implementation and an in-memory one ([`MemoryStore`]) used for local
//! development and tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p abc-shop-cli -- migrate
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use abc_shop_core::{CartLineId, Email, Owner, ProductId};

use crate::models::{ApiToken, CartLine, LineChanges, LineFilter, NewCartLine, NewProduct, Product, User};

pub mod cart_lines;
pub mod maintenance;
pub mod memory;
pub mod products;
pub mod seed;
pub mod tokens;

pub use cart_lines::CartLineRepository;
pub use memory::MemoryStore;
pub use products::ProductRepository;
pub use tokens::TokenRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate cart line).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!(
                "{what}: {}",
                db_err.constraint().unwrap_or("unique index")
            ));
        }
        Self::Database(err)
    }
}

/// Cart lines scoped to an owner.
#[async_trait]
pub trait CartLineStore: Send + Sync {
    /// All of the owner's lines, oldest first.
    async fn lines_for(&self, owner: &Owner) -> Result<Vec<CartLine>, RepositoryError>;

    /// Insert the line, or add its quantity to the owner's existing line for
    /// the same product and selection. Atomic.
    async fn upsert(&self, line: &NewCartLine) -> Result<CartLine, RepositoryError>;

    /// Delete one line. Returns the number of rows removed (0 or 1).
    async fn delete_line(&self, owner: &Owner, id: CartLineId) -> Result<u64, RepositoryError>;

    /// Delete every line of the owner selected by `filter`.
    async fn delete_matching(
        &self,
        owner: &Owner,
        filter: &LineFilter,
    ) -> Result<u64, RepositoryError>;

    /// Apply `changes` to one line.
    ///
    /// If the new selection collides with another of the owner's lines for
    /// the same product, the two are folded: the updated line's quantity is
    /// added to the other line and the updated line is deleted. Returns the
    /// surviving line, or `None` if the owner has no line with `id`.
    async fn update_line(
        &self,
        owner: &Owner,
        id: CartLineId,
        changes: &LineChanges,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Delete all of the owner's lines.
    async fn clear(&self, owner: &Owner) -> Result<u64, RepositoryError>;
}

/// Read-side product lookups used by the cart.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// An active product by id.
    async fn active_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// The active products among `ids`. Missing or inactive ids are skipped.
    async fn active_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a product or overwrite the existing row with the same id.
    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;
}

/// Users and their bearer tokens.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    /// The token with this digest, whether or not it has expired.
    async fn find_token(&self, token_hash: &str) -> Result<Option<ApiToken>, RepositoryError>;

    /// The user with this email, created if missing.
    async fn ensure_user(&self, email: &Email) -> Result<User, RepositoryError>;

    /// Store a newly issued token.
    async fn insert_token(&self, token: &ApiToken) -> Result<(), RepositoryError>;
}

/// The repositories backing one storefront instance.
#[derive(Clone)]
pub struct Storage {
    carts: Arc<dyn CartLineStore>,
    catalog: Arc<dyn ProductCatalog>,
    tokens: Arc<dyn AccessTokenStore>,
    pool: Option<PgPool>,
}

impl Storage {
    /// Repositories over a `PostgreSQL` pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            carts: Arc::new(CartLineRepository::new(pool.clone())),
            catalog: Arc::new(ProductRepository::new(pool.clone())),
            tokens: Arc::new(TokenRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repositories over one shared in-memory store.
    #[must_use]
    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            carts: store.clone(),
            catalog: store.clone(),
            tokens: store,
            pool: None,
        }
    }

    /// Replace the catalog, e.g. with a cached wrapper.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn carts(&self) -> &dyn CartLineStore {
        self.carts.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.catalog.as_ref()
    }

    /// Shared handle to the catalog, for wrapping.
    #[must_use]
    pub fn catalog_handle(&self) -> Arc<dyn ProductCatalog> {
        self.catalog.clone()
    }

    #[must_use]
    pub fn tokens(&self) -> &dyn AccessTokenStore {
        self.tokens.as_ref()
    }

    /// The `PostgreSQL` pool, when running against a database.
    #[must_use]
    pub const fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// Check that the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
