//! Seed the catalog with products from YAML.
//!
//! The file format is documented on
//! [`abc_shop_storefront::db::seed`].

use std::path::Path;

use tracing::{error, info};

use abc_shop_storefront::db::ProductRepository;
use abc_shop_storefront::db::seed::{ProductSeed, seed_products};

/// Upsert every product in `file`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, the
/// database is unreachable, or any product fails to save.
pub async fn products(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }

    info!(path = %file.display(), "Loading products from file");

    // Read and validate YAML before connecting to database
    let seed = ProductSeed::from_file(file).await?;
    info!(products = seed.products.len(), "Configuration validated successfully");

    let pool = super::connect().await?;
    let catalog = ProductRepository::new(pool);

    let result = seed_products(&catalog, &seed).await;

    info!("Seeding complete!");
    info!("  Products upserted: {}", result.upserted);

    if !result.errors.is_empty() {
        error!("  Errors: {}", result.errors.len());
        for (product, err) in &result.errors {
            error!("    - {product}: {err}");
        }
        return Err(format!("{} products failed", result.errors.len()).into());
    }

    Ok(())
}
