//! Business logic services for the cart API.
//!
//! # Services
//!
//! - `cart` - Cart read/add/remove/update/clear scoped to an owner
//! - `catalog_cache` - `moka` cache in front of the product catalog
//! - `tokens` - Bearer token hashing, issue and resolution

pub mod cart;
pub mod catalog_cache;
pub mod tokens;

pub use cart::{CartError, CartService};
pub use catalog_cache::CachedCatalog;
pub use tokens::{IssuedToken, TokenError, TokenHasher, generate_token, issue_token, resolve_token};
