//! Client error types.

use thiserror::Error;

/// Errors from key/value storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    /// The key cannot be used as a storage name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A previous writer panicked while holding the lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors that can occur when talking to the cart API or local storage.
#[derive(Debug, Error)]
pub enum CartClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or stored cart.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The item cannot be added or addressed.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key/value storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
