//! `PostgreSQL` users and API tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use abc_shop_core::{Email, UserId};

use super::{AccessTokenStore, RepositoryError};
use crate::models::{ApiToken, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    user_id: i32,
    token_hash: String,
    label: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

/// Users in `storefront.user` and tokens in `storefront.api_token`.
#[derive(Clone)]
pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    /// Create a new token repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessTokenStore for TokenRepository {
    async fn find_token(&self, token_hash: &str) -> Result<Option<ApiToken>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r"
            SELECT user_id, token_hash, label, created_at, expires_at
            FROM storefront.api_token
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ApiToken {
            user_id: UserId::new(r.user_id),
            token_hash: r.token_hash,
            label: r.label,
            created_at: r.created_at,
            expires_at: r.expires_at,
        }))
    }

    async fn ensure_user(&self, email: &Email) -> Result<User, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row.
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.user (email)
            VALUES ($1)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email, created_at
            ",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(User {
            id: UserId::new(row.id),
            email,
            created_at: row.created_at,
        })
    }

    async fn insert_token(&self, token: &ApiToken) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.api_token (user_id, token_hash, label, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(token.user_id.as_i32())
        .bind(&token.token_hash)
        .bind(token.label.as_deref())
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "api token"))?;

        Ok(())
    }
}
