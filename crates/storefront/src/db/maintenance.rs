//! Cart table maintenance: index repair and purge.
//!
//! `repair_cart_indexes` brings a live database to the current line identity
//! rule (owner + product + size + color) without going through migrations.
//! It is idempotent: re-running it only lists the indexes.

use sqlx::PgPool;
use tracing::{info, instrument, warn};

use super::RepositoryError;

/// The pre-selection unique index on `(user_id, product_id, variant_id)`.
pub const LEGACY_INDEX: &str = "cart_line_user_product_variant_key";

/// Unique index for user-owned lines.
pub const USER_SELECTION_INDEX: &str = "cart_line_user_selection_key";

/// Unique index for session-owned lines.
pub const SESSION_SELECTION_INDEX: &str = "cart_line_session_selection_key";

/// An index on `storefront.cart_line`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IndexInfo {
    pub name: String,
    pub definition: String,
}

/// Outcome of [`repair_cart_indexes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRepair {
    pub before: Vec<IndexInfo>,
    pub after: Vec<IndexInfo>,
    /// Whether the legacy index existed and was dropped.
    pub dropped_legacy: bool,
    /// Lines deleted because the legacy index was present.
    pub purged_lines: u64,
}

/// List the indexes on `storefront.cart_line`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the catalog query fails.
pub async fn list_cart_indexes(pool: &PgPool) -> Result<Vec<IndexInfo>, RepositoryError> {
    let indexes = sqlx::query_as::<_, IndexInfo>(
        r"
        SELECT indexname AS name, indexdef AS definition
        FROM pg_indexes
        WHERE schemaname = 'storefront' AND tablename = 'cart_line'
        ORDER BY indexname
        ",
    )
    .fetch_all(pool)
    .await?;

    Ok(indexes)
}

/// Drop the legacy index, purge the lines it governed, and ensure the
/// selection indexes exist. Runs in one transaction.
///
/// Lines are only purged when the legacy index is found, so a repaired
/// database keeps its carts on later runs.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any statement fails; nothing is
/// committed in that case.
#[instrument(skip(pool))]
pub async fn repair_cart_indexes(pool: &PgPool) -> Result<IndexRepair, RepositoryError> {
    let before = list_cart_indexes(pool).await?;
    let dropped_legacy = before.iter().any(|index| index.name == LEGACY_INDEX);

    let mut tx = pool.begin().await?;
    let mut purged_lines = 0;

    if dropped_legacy {
        warn!(index = LEGACY_INDEX, "Dropping legacy cart index and purging cart lines");
        sqlx::query(&format!("DROP INDEX IF EXISTS storefront.{LEGACY_INDEX}"))
            .execute(&mut *tx)
            .await?;
        purged_lines = sqlx::query("DELETE FROM storefront.cart_line")
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    sqlx::query(
        r"
        ALTER TABLE storefront.cart_line
            ADD COLUMN IF NOT EXISTS selected_size TEXT,
            ADD COLUMN IF NOT EXISTS selected_color TEXT
        ",
    )
    .execute(&mut *tx)
    .await?;

    for (index, column) in [
        (USER_SELECTION_INDEX, "user_id"),
        (SESSION_SELECTION_INDEX, "session_id"),
    ] {
        sqlx::query(&format!(
            r"
            CREATE UNIQUE INDEX IF NOT EXISTS {index}
                ON storefront.cart_line ({column}, product_id, selected_size, selected_color)
                NULLS NOT DISTINCT
                WHERE {column} IS NOT NULL
            "
        ))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let after = list_cart_indexes(pool).await?;
    info!(dropped_legacy, purged_lines, indexes = after.len(), "Cart indexes repaired");

    Ok(IndexRepair {
        before,
        after,
        dropped_legacy,
        purged_lines,
    })
}

/// Delete every cart line of every owner.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
#[instrument(skip(pool))]
pub async fn purge_cart_lines(pool: &PgPool) -> Result<u64, RepositoryError> {
    let deleted = sqlx::query("DELETE FROM storefront.cart_line")
        .execute(pool)
        .await?
        .rows_affected();

    warn!(deleted, "Purged all cart lines");
    Ok(deleted)
}
