//! Cart ownership.
//!
//! Every cart line belongs to exactly one owner: an authenticated user or an
//! anonymous browser session. Modelling this as an enum makes the "never both"
//! rule unrepresentable instead of a convention over two nullable columns.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Maximum accepted session id length.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// Errors that can occur when parsing a [`SessionId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session id cannot be empty")]
    Empty,
    #[error("session id must be at most {MAX_SESSION_ID_LENGTH} characters")]
    TooLong,
    #[error("session id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Anonymous session identifier, sent by browsers as a cookie or header.
///
/// Restricted to URL-safe characters (`A-Z a-z 0-9 - _ .`) so it can be
/// logged and stored without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Parse a session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, too long, or contains
    /// characters outside the URL-safe set.
    pub fn parse(input: &str) -> Result<Self, SessionIdError> {
        let value = input.trim();
        if value.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if value.len() > MAX_SESSION_ID_LENGTH {
            return Err(SessionIdError::TooLong);
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(SessionIdError::InvalidCharacter(c));
        }
        Ok(Self(value.to_owned()))
    }

    /// Get the session id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The owner of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Authenticated user.
    User(UserId),
    /// Anonymous browser session.
    Session(SessionId),
}

impl Owner {
    /// Short label for logs and tracing fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Session(_) => "session",
        }
    }

    /// The user id, if this is an authenticated owner.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Session(_) => None,
        }
    }

    /// The session id, if this is an anonymous owner.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::User(_) => None,
            Self::Session(id) => Some(id),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(id) => write!(f, "session:{id}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_parse() {
        assert!(SessionId::parse("a1b2-c3_d4.e5").is_ok());
        assert_eq!(SessionId::parse(""), Err(SessionIdError::Empty));
        assert_eq!(
            SessionId::parse("abc;drop"),
            Err(SessionIdError::InvalidCharacter(';'))
        );
        assert_eq!(
            SessionId::parse(&"x".repeat(MAX_SESSION_ID_LENGTH + 1)),
            Err(SessionIdError::TooLong)
        );
    }

    #[test]
    fn test_owner_accessors() {
        let user = Owner::User(UserId::new(3));
        assert_eq!(user.user_id(), Some(UserId::new(3)));
        assert!(user.session_id().is_none());
        assert_eq!(user.to_string(), "user:3");

        let session = Owner::Session(SessionId::parse("sid-1").unwrap());
        assert_eq!(session.kind(), "session");
        assert!(session.user_id().is_none());
    }
}
