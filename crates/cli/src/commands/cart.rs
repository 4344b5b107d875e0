//! Cart maintenance commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`); not needed for `smoke`
//! - `CART_API_URL` - default for `smoke --url`

use tracing::{info, warn};

use abc_shop_cart_client::{
    CartClientConfig, CartItemInput, CartRepository, Identity, RemoteCartRepository,
};
use abc_shop_core::{CartView, ColorInput, LooseInt, ProductId, SessionId};
use abc_shop_storefront::db::maintenance::{self, IndexInfo};

fn log_indexes(heading: &str, indexes: &[IndexInfo]) {
    info!("{heading}:");
    if indexes.is_empty() {
        info!("  (none)");
    }
    for index in indexes {
        info!("  {}: {}", index.name, index.definition);
    }
}

/// Replace the legacy `(owner, product, variant)` unique index with the
/// per-selection indexes. Safe to run repeatedly.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a statement fails.
pub async fn repair_indexes() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let repair = maintenance::repair_cart_indexes(&pool).await?;

    log_indexes("Indexes before", &repair.before);
    if repair.dropped_legacy {
        warn!(
            "Dropped {} and deleted {} cart lines",
            maintenance::LEGACY_INDEX,
            repair.purged_lines
        );
    } else {
        info!("Legacy index not present; no cart lines deleted");
    }
    log_indexes("Indexes after", &repair.after);

    Ok(())
}

/// Delete every cart line.
///
/// # Errors
///
/// Returns an error without `--yes`, or if the delete fails.
pub async fn purge(confirmed: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        return Err("refusing to delete all cart lines without --yes".into());
    }

    let pool = super::connect().await?;
    let deleted = maintenance::purge_cart_lines(&pool).await?;
    info!("Deleted {deleted} cart lines");
    Ok(())
}

fn quantity_of(cart: &CartView, item: &CartItemInput) -> Result<i32, Box<dyn std::error::Error>> {
    let key = item.normalize()?.key();
    Ok(cart
        .items
        .iter()
        .filter(|line| line.key() == key)
        .map(|line| line.quantity)
        .sum())
}

/// Add a sample item twice as a guest and check the two adds merged.
///
/// # Errors
///
/// Returns an error if any API call fails or the adds did not merge into
/// one line.
pub async fn smoke(
    url: &str,
    session: &str,
    product: i32,
    cleanup: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = CartClientConfig::new(url)?;
    let identity = Identity::Anonymous {
        session_id: SessionId::parse(session)?,
    };
    let api = RemoteCartRepository::new(&config, &identity)?;

    let sample = CartItemInput {
        product_id: Some(LooseInt::from(product)),
        quantity: Some(LooseInt::from(1)),
        selected_size: Some("M".to_string()),
        selected_color: Some(ColorInput::from("Red")),
        ..CartItemInput::default()
    };
    let item = sample.normalize()?;

    let before = api.fetch().await?;
    let start = quantity_of(&before, &sample)?;
    info!(lines = before.count, "Fetched cart for session {session}");

    api.add(&item).await?;
    let cart = api.add(&item).await?;
    let end = quantity_of(&cart, &sample)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&cart)?);
    }

    let lines = cart.items.iter().filter(|line| line.key() == item.key()).count();
    if lines != 1 || end != start + 2 {
        return Err(format!(
            "expected one line for {} with quantity {}, found {lines} line(s) totalling {end}",
            item.key(),
            start + 2
        )
        .into());
    }
    info!(product_id = %ProductId::new(product), quantity = end, "Adds merged into one line");

    if cleanup && let Some(line) = cart.items.iter().find(|line| line.key() == item.key()) {
        let cart = api.remove(line).await?;
        info!(lines = cart.count, "Removed sample line");
    }

    Ok(())
}
