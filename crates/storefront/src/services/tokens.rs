//! Bearer token issue and verification.
//!
//! Tokens are 256-bit random values, URL-safe base64 encoded. The server only
//! ever stores `HMAC-SHA256(pepper, token)`, so a leaked table cannot be
//! replayed without the pepper.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, instrument};

use abc_shop_core::{Email, UserId};

use crate::db::{AccessTokenStore, RepositoryError};
use crate::models::ApiToken;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;

/// Errors resolving or issuing tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token pepper: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Keyed digest of bearer tokens.
#[derive(Clone)]
pub struct TokenHasher {
    pepper: SecretString,
}

impl TokenHasher {
    #[must_use]
    pub const fn new(pepper: SecretString) -> Self {
        Self { pepper }
    }

    /// Hex-encoded HMAC-SHA256 of `token`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidKey` if the pepper is rejected as an HMAC key.
    pub fn digest(&self, token: &str) -> Result<String, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.pepper.expose_secret().as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        mac.update(token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for TokenHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenHasher").finish_non_exhaustive()
    }
}

/// Generate a new random bearer token.
#[must_use]
pub fn generate_token() -> SecretString {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    SecretString::from(URL_SAFE_NO_PAD.encode(bytes))
}

/// Resolve a presented bearer token to its user.
///
/// Returns `None` for unknown or expired tokens.
///
/// # Errors
///
/// Returns `TokenError` if hashing or the lookup fails.
pub async fn resolve_token(
    store: &dyn AccessTokenStore,
    hasher: &TokenHasher,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<UserId>, TokenError> {
    let digest = hasher.digest(token)?;
    Ok(store
        .find_token(&digest)
        .await?
        .filter(|stored| stored.is_live(now))
        .map(|stored| stored.user_id))
}

/// A freshly issued token. The plaintext is not recoverable afterwards.
#[derive(Debug)]
pub struct IssuedToken {
    pub user_id: UserId,
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Issue a token for `email`, creating the user if needed.
///
/// # Errors
///
/// Returns `TokenError` if hashing or any repository call fails.
#[instrument(skip(store, hasher), fields(email = %email))]
pub async fn issue_token(
    store: &dyn AccessTokenStore,
    hasher: &TokenHasher,
    email: &Email,
    label: Option<String>,
    valid_for: Option<Duration>,
) -> Result<IssuedToken, TokenError> {
    let user = store.ensure_user(email).await?;
    let token = generate_token();
    let now = Utc::now();
    let expires_at = valid_for.map(|d| now + d);

    store
        .insert_token(&ApiToken {
            user_id: user.id,
            token_hash: hasher.digest(token.expose_secret())?,
            label,
            created_at: now,
            expires_at,
        })
        .await?;

    info!(user_id = %user.id, ?expires_at, "Issued API token");
    Ok(IssuedToken {
        user_id: user.id,
        token,
        expires_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn hasher() -> TokenHasher {
        TokenHasher::new(SecretString::from("k3Y!pepper-for-tests-9fQz#Lm2@xW7"))
    }

    #[test]
    fn test_digest_is_stable_and_keyed() {
        let a = hasher().digest("token").unwrap();
        assert_eq!(a, hasher().digest("token").unwrap());
        assert_eq!(a.len(), 64);

        let other = TokenHasher::new(SecretString::from("another-pepper-value-0123456789ab"));
        assert_ne!(a, other.digest("token").unwrap());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a.expose_secret(), b.expose_secret());
        assert_eq!(a.expose_secret().len(), 43);
    }

    #[tokio::test]
    async fn test_issue_then_resolve() {
        let store = MemoryStore::new();
        let email = Email::parse("shopper@example.com").unwrap();
        let issued = issue_token(&store, &hasher(), &email, None, None).await.unwrap();

        let resolved = resolve_token(&store, &hasher(), issued.token.expose_secret(), Utc::now())
            .await
            .unwrap();
        assert_eq!(resolved, Some(issued.user_id));

        let unknown = resolve_token(&store, &hasher(), "not-a-token", Utc::now())
            .await
            .unwrap();
        assert_eq!(unknown, None);
    }

    #[tokio::test]
    async fn test_expired_token_does_not_resolve() {
        let store = MemoryStore::new();
        let email = Email::parse("shopper@example.com").unwrap();
        let issued = issue_token(&store, &hasher(), &email, None, Some(Duration::hours(1)))
            .await
            .unwrap();

        let later = Utc::now() + Duration::hours(2);
        let resolved = resolve_token(&store, &hasher(), issued.token.expose_secret(), later)
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }
}
