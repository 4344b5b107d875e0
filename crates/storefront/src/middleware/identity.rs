//! Caller identity extraction.
//!
//! A request is owned by, in order of precedence:
//!
//! 1. the user behind an `Authorization: Bearer <token>` header
//! 2. the anonymous session in the `session_id` cookie
//! 3. the anonymous session in the `x-session-id` header
//!
//! A bearer token that does not resolve is rejected with 401 rather than
//! falling back to the session, so a stale login never silently reads a
//! guest cart.

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use chrono::Utc;
use cookie::Cookie;
use tracing::Span;

use abc_shop_core::{Owner, SessionId};

use crate::error::{AppError, set_sentry_user};
use crate::services::resolve_token;
use crate::state::AppState;

/// Cookie carrying the anonymous session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Header carrying the anonymous session id.
pub const SESSION_HEADER: &str = "x-session-id";

const BEARER_PREFIX: &str = "Bearer ";

/// The cart owner of the current request, if any.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Caller(owner): Caller) -> impl IntoResponse {
///     match owner {
///         Some(owner) => format!("cart of {owner}"),
///         None => "no cart".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Option<Owner>);

impl Caller {
    #[must_use]
    pub const fn owner(&self) -> Option<&Owner> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            let user_id = resolve_token(
                state.storage().tokens(),
                state.tokens(),
                token,
                Utc::now(),
            )
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

            set_sentry_user(&user_id);
            Span::current().record("owner", "user");
            return Ok(Self(Some(Owner::User(user_id))));
        }

        match session_id(&parts.headers) {
            Some(raw) => {
                let session = SessionId::parse(&raw)
                    .map_err(|_| AppError::BadRequest("Invalid session id".to_string()))?;
                Span::current().record("owner", "session");
                Ok(Self(Some(Owner::Session(session))))
            }
            None => Ok(Self(None)),
        }
    }
}

/// The token of a `Bearer` authorization header. Other schemes are ignored.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Session id from the cookie, falling back to the header.
fn session_id(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            bearer_token(&headers(&[("authorization", "Bearer abc123")])),
            Some("abc123")
        );
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer  ")])), None);
        assert_eq!(bearer_token(&headers(&[])), None);
    }

    #[test]
    fn test_session_cookie_wins_over_header() {
        let map = headers(&[
            ("cookie", "theme=dark; session_id=from-cookie"),
            ("x-session-id", "from-header"),
        ]);
        assert_eq!(session_id(&map).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_session_header_fallback() {
        let map = headers(&[("cookie", "theme=dark"), ("x-session-id", " guest-9 ")]);
        assert_eq!(session_id(&map).as_deref(), Some("guest-9"));
        assert_eq!(session_id(&headers(&[])), None);
    }

    #[test]
    fn test_session_cookie_across_headers() {
        let map = headers(&[("cookie", "a=1"), ("cookie", "session_id=s-2")]);
        assert_eq!(session_id(&map).as_deref(), Some("s-2"));
    }
}
