//! `PostgreSQL` cart line repository.
//!
//! Queries are scoped to one owner column (`user_id` or `session_id`); the
//! column name is chosen from the [`Owner`] variant and the value is always
//! bound.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::{Query, QueryAs};
use sqlx::{PgPool, Postgres};

use abc_shop_core::{CartLineId, Owner, ProductId, Selection, SessionId, UserId, VariantId};

use super::{CartLineStore, RepositoryError};
use crate::models::{CartLine, LineChanges, LineFilter, NewCartLine};

/// Merged quantities saturate here rather than overflowing `INT`.
const MAX_QUANTITY: i32 = i32::MAX;

const LINE_COLUMNS: &str = "id, user_id, session_id, product_id, variant_id, quantity, \
                            selected_size, selected_color, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    user_id: Option<i32>,
    session_id: Option<String>,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    selected_size: Option<String>,
    selected_color: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let owner = match (row.user_id, row.session_id) {
            (Some(user_id), None) => Owner::User(UserId::new(user_id)),
            (None, Some(session_id)) => {
                Owner::Session(SessionId::parse(&session_id).map_err(|e| {
                    RepositoryError::DataCorruption(format!(
                        "invalid session id on cart line {}: {e}",
                        row.id
                    ))
                })?)
            }
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "cart line {} must have exactly one owner",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: CartLineId::new(row.id),
            owner,
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            quantity: row.quantity,
            selection: Selection::new(row.selected_size.as_deref(), row.selected_color.as_deref()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column holding the owner id.
const fn owner_column(owner: &Owner) -> &'static str {
    match owner {
        Owner::User(_) => "user_id",
        Owner::Session(_) => "session_id",
    }
}

fn bind_owner<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    owner: &'q Owner,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    match owner {
        Owner::User(id) => query.bind(id.as_i32()),
        Owner::Session(id) => query.bind(id.as_str()),
    }
}

fn bind_owner_query<'q>(
    query: Query<'q, Postgres, PgArguments>,
    owner: &'q Owner,
) -> Query<'q, Postgres, PgArguments> {
    match owner {
        Owner::User(id) => query.bind(id.as_i32()),
        Owner::Session(id) => query.bind(id.as_str()),
    }
}

/// Cart lines in `storefront.cart_line`.
#[derive(Clone)]
pub struct CartLineRepository {
    pool: PgPool,
}

impl CartLineRepository {
    /// Create a new cart line repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartLineStore for CartLineRepository {
    async fn lines_for(&self, owner: &Owner) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM storefront.cart_line WHERE {} = $1 ORDER BY id",
            owner_column(owner)
        );
        let rows = bind_owner(sqlx::query_as::<_, CartLineRow>(&sql), owner)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn upsert(&self, line: &NewCartLine) -> Result<CartLine, RepositoryError> {
        let column = owner_column(&line.owner);
        // Must name the partial index's columns and predicate for inference.
        let sql = format!(
            r"
            INSERT INTO storefront.cart_line AS line
                ({column}, product_id, variant_id, quantity, selected_size, selected_color)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ({column}, product_id, selected_size, selected_color)
                WHERE {column} IS NOT NULL
            DO UPDATE SET quantity = LEAST(
                              line.quantity::BIGINT + EXCLUDED.quantity, {MAX_QUANTITY}
                          )::INT,
                          updated_at = NOW()
            RETURNING {LINE_COLUMNS}
            "
        );

        let row = bind_owner(sqlx::query_as::<_, CartLineRow>(&sql), &line.owner)
            .bind(line.product_id.as_i32())
            .bind(line.variant_id.map(|v| v.as_i32()))
            .bind(line.quantity)
            .bind(line.selection.size.as_deref())
            .bind(line.selection.color.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "cart line upsert"))?;

        CartLine::try_from(row)
    }

    async fn delete_line(&self, owner: &Owner, id: CartLineId) -> Result<u64, RepositoryError> {
        let sql = format!(
            "DELETE FROM storefront.cart_line WHERE {} = $1 AND id = $2",
            owner_column(owner)
        );
        let result = bind_owner_query(sqlx::query(&sql), owner)
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_matching(
        &self,
        owner: &Owner,
        filter: &LineFilter,
    ) -> Result<u64, RepositoryError> {
        // NULL parameters leave the corresponding column unconstrained.
        let sql = format!(
            r"
            DELETE FROM storefront.cart_line
            WHERE {} = $1
              AND product_id = $2
              AND ($3::INTEGER IS NULL OR variant_id = $3)
              AND ($4::TEXT IS NULL OR selected_size = $4)
              AND ($5::TEXT IS NULL OR selected_color = $5)
            ",
            owner_column(owner)
        );
        let result = bind_owner_query(sqlx::query(&sql), owner)
            .bind(filter.product_id.as_i32())
            .bind(filter.variant_id.map(|v| v.as_i32()))
            .bind(filter.size.as_deref())
            .bind(filter.color.as_deref())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn update_line(
        &self,
        owner: &Owner,
        id: CartLineId,
        changes: &LineChanges,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let column = owner_column(owner);
        let mut tx = self.pool.begin().await?;

        let locate = format!(
            "SELECT {LINE_COLUMNS} FROM storefront.cart_line \
             WHERE {column} = $1 AND id = $2 FOR UPDATE"
        );
        let Some(row) = bind_owner(sqlx::query_as::<_, CartLineRow>(&locate), owner)
            .bind(id.as_i32())
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let current = CartLine::try_from(row)?;
        let (quantity, selection) = changes.apply_to(&current);

        if selection != current.selection {
            let collision = format!(
                r"
                SELECT {LINE_COLUMNS} FROM storefront.cart_line
                WHERE {column} = $1
                  AND product_id = $2
                  AND selected_size IS NOT DISTINCT FROM $3
                  AND selected_color IS NOT DISTINCT FROM $4
                  AND id <> $5
                FOR UPDATE
                "
            );
            let other = bind_owner(sqlx::query_as::<_, CartLineRow>(&collision), owner)
                .bind(current.product_id.as_i32())
                .bind(selection.size.as_deref())
                .bind(selection.color.as_deref())
                .bind(id.as_i32())
                .fetch_optional(&mut *tx)
                .await?;

            if let Some(other) = other {
                let merged = sqlx::query_as::<_, CartLineRow>(&format!(
                    r"
                    UPDATE storefront.cart_line
                    SET quantity = LEAST(quantity::BIGINT + $1, {MAX_QUANTITY})::INT,
                        updated_at = NOW()
                    WHERE id = $2
                    RETURNING {LINE_COLUMNS}
                    "
                ))
                .bind(quantity)
                .bind(other.id)
                .fetch_one(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM storefront.cart_line WHERE id = $1")
                    .bind(id.as_i32())
                    .execute(&mut *tx)
                    .await?;

                tx.commit().await?;
                tracing::debug!(line_id = %id, into = merged.id, "Folded cart line into existing selection");
                return CartLine::try_from(merged).map(Some);
            }
        }

        let updated = sqlx::query_as::<_, CartLineRow>(&format!(
            r"
            UPDATE storefront.cart_line
            SET quantity = $1, selected_size = $2, selected_color = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING {LINE_COLUMNS}
            "
        ))
        .bind(quantity)
        .bind(selection.size.as_deref())
        .bind(selection.color.as_deref())
        .bind(id.as_i32())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "cart line update"))?;

        tx.commit().await?;
        CartLine::try_from(updated).map(Some)
    }

    async fn clear(&self, owner: &Owner) -> Result<u64, RepositoryError> {
        let sql = format!(
            "DELETE FROM storefront.cart_line WHERE {} = $1",
            owner_column(owner)
        );
        let result = bind_owner_query(sqlx::query(&sql), owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(user_id: Option<i32>, session_id: Option<&str>) -> CartLineRow {
        let now = Utc::now();
        CartLineRow {
            id: 9,
            user_id,
            session_id: session_id.map(String::from),
            product_id: 3,
            variant_id: None,
            quantity: 1,
            selected_size: Some(" M ".to_string()),
            selected_color: Some(String::new()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_owner_mapping() {
        let line = CartLine::try_from(row(Some(4), None)).unwrap();
        assert_eq!(line.owner, Owner::User(UserId::new(4)));
        assert_eq!(line.selection.size.as_deref(), Some("M"));
        assert_eq!(line.selection.color, None);

        let line = CartLine::try_from(row(None, Some("guest-1"))).unwrap();
        assert_eq!(line.owner.session_id().map(SessionId::as_str), Some("guest-1"));
    }

    #[test]
    fn test_row_with_two_owners_is_corrupt() {
        assert!(matches!(
            CartLine::try_from(row(Some(4), Some("guest-1"))),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            CartLine::try_from(row(None, None)),
            Err(RepositoryError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_owner_column() {
        assert_eq!(owner_column(&Owner::User(UserId::new(1))), "user_id");
        let session = Owner::Session(SessionId::parse("abc").unwrap());
        assert_eq!(owner_column(&session), "session_id");
    }
}
