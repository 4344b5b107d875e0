//! Cart client configuration.
//!
//! # Environment Variables
//!
//! - `CART_API_URL` - Base URL of the cart API (required)
//! - `CART_API_TIMEOUT_SECS` - Per-request timeout (default: 10)

use std::time::Duration;

use url::Url;

use crate::error::CartClientError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the cart API lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct CartClientConfig {
    /// Base URL; `/api/cart/...` paths are resolved against it.
    pub base_url: Url,
    pub timeout: Duration,
}

impl CartClientConfig {
    /// Configuration for `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Config` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, CartClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CartClientError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(CartClientError::Config(format!(
                "unsupported URL scheme '{}'",
                base_url.scheme()
            )));
        }
        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Config` if `CART_API_URL` is missing or
    /// either variable is invalid.
    pub fn from_env() -> Result<Self, CartClientError> {
        let _ = dotenvy::dotenv();

        let base_url = std::env::var("CART_API_URL")
            .map_err(|_| CartClientError::Config("missing CART_API_URL".to_string()))?;
        let config = Self::new(&base_url)?;

        match std::env::var("CART_API_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    CartClientError::Config(format!("invalid CART_API_TIMEOUT_SECS: {e}"))
                })?;
                Ok(config.with_timeout(Duration::from_secs(secs)))
            }
            Err(_) => Ok(config),
        }
    }

    /// Absolute URL for an API path such as `/api/cart/add`.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::Config` if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, CartClientError> {
        self.base_url
            .join(path)
            .map_err(|e| CartClientError::Config(format!("invalid endpoint '{path}': {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_resolution() {
        let config = CartClientConfig::new("http://127.0.0.1:4000").unwrap();
        assert_eq!(
            config.endpoint("/api/cart/add").unwrap().as_str(),
            "http://127.0.0.1:4000/api/cart/add"
        );
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(CartClientConfig::new("not a url").is_err());
        assert!(CartClientConfig::new("ftp://shop.example.com").is_err());
    }
}
