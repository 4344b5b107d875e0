//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! ```text
//! crates/storefront/migrations/
//! ├── 20260301000001_create_users.sql
//! ├── 20260301000002_create_products.sql
//! ├── 20260301000003_create_cart_lines.sql
//! └── 20260301000004_cart_line_selection_key.sql
//! ```
//!
//! The last migration drops the legacy `(user_id, product_id, variant_id)`
//! index and deletes existing cart lines rather than backfilling size and
//! color.

use thiserror::Error;

use abc_shop_storefront::config::{ConfigError, StorefrontConfig};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration
/// fails.
pub async fn storefront() -> Result<(), MigrationError> {
    let database_url = StorefrontConfig::database_url_from_env()?;

    tracing::info!("Connecting to storefront database...");
    let pool = abc_shop_storefront::db::create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
