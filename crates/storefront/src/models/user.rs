//! User and API token domain types.

use chrono::{DateTime, Utc};

use abc_shop_core::{Email, UserId};

/// A registered shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// A bearer token issued to a user.
///
/// Only the token's HMAC digest is stored; the plaintext is shown once at
/// issue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    /// User the token authenticates as.
    pub user_id: UserId,
    /// Hex-encoded HMAC-SHA256 of the token.
    pub token_hash: String,
    /// Free-form label (e.g. "mobile app").
    pub label: Option<String>,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
    /// When the token stops being accepted. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    /// Whether the token is still valid at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires| expires > now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn token(expires_at: Option<DateTime<Utc>>) -> ApiToken {
        ApiToken {
            user_id: UserId::new(1),
            token_hash: "ab".repeat(32),
            label: None,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        assert!(token(None).is_live(now));
        assert!(token(Some(now + Duration::days(1))).is_live(now));
        assert!(!token(Some(now - Duration::seconds(1))).is_live(now));
    }
}
