//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Storage;
use crate::services::TokenHasher;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the storage backend, token hasher and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    storage: Storage,
    tokens: TokenHasher,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `storage` - Repositories for carts, products and tokens
    #[must_use]
    pub fn new(config: StorefrontConfig, storage: Storage) -> Self {
        let tokens = TokenHasher::new(config.token_pepper.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                tokens,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    /// Get a reference to the bearer token hasher.
    #[must_use]
    pub fn tokens(&self) -> &TokenHasher {
        &self.inner.tokens
    }
}
