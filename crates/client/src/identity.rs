//! Who the cart belongs to, decided once when the store is built.

use secrecy::SecretString;

use abc_shop_core::{SessionId, UserId};

/// Storage key for the signed-in user's cached cart.
pub const CART_KEY: &str = "cart_v1";

/// Storage key for a guest's session cart.
pub const SESSION_CART_KEY: &str = "cart_session_v1";

/// The caller of the cart API.
#[derive(Debug, Clone)]
pub enum Identity {
    /// Signed in; carts live on the server, cached under [`CART_KEY`].
    Authenticated { user_id: UserId, token: SecretString },
    /// Guest; the cart lives only under [`SESSION_CART_KEY`].
    Anonymous { session_id: SessionId },
}

impl Identity {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Storage key holding this identity's local cart.
    #[must_use]
    pub const fn cart_key(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => CART_KEY,
            Self::Anonymous { .. } => SESSION_CART_KEY,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_keys() {
        let user = Identity::Authenticated {
            user_id: UserId::new(1),
            token: SecretString::from("t"),
        };
        let guest = Identity::Anonymous {
            session_id: SessionId::parse("guest-1").unwrap(),
        };
        assert!(user.is_authenticated());
        assert_eq!(user.cart_key(), "cart_v1");
        assert!(!guest.is_authenticated());
        assert_eq!(guest.cart_key(), "cart_session_v1");
    }
}
