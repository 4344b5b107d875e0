//! ABC Shop cart client.
//!
//! A cart store for front ends and tools that talk to the storefront cart
//! API. Signed-in carts live on the server with a local copy used when the
//! server cannot be reached; guest carts live only in session-scoped local
//! storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! let store = CartStore::new(
//!     CartClientConfig::from_env()?,
//!     Identity::Anonymous { session_id },
//!     Arc::new(FileStorage::new(".cart")),
//! )?;
//! let mut updates = store.subscribe();
//! store.add_item(&CartItemInput::product(product_id)).await?;
//! ```
//!
//! # Modules
//!
//! - [`store`] - [`CartStore`], fallback and publishing
//! - [`remote`] / [`local`] - the two [`CartRepository`] implementations
//! - [`item`] - normalization of loosely shaped item payloads
//! - [`storage`] - key/value storage for local carts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod identity;
pub mod item;
pub mod local;
pub mod remote;
pub mod repository;
pub mod storage;
pub mod store;

pub use config::CartClientConfig;
pub use error::{CartClientError, StorageError};
pub use identity::{CART_KEY, Identity, SESSION_CART_KEY};
pub use item::{CartItemInput, ItemUpdate, NormalizedItem};
pub use local::LocalCartRepository;
pub use remote::RemoteCartRepository;
pub use repository::CartRepository;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::CartStore;
