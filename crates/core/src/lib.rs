//! ABC Shop Core - Shared cart types.
//!
//! This crate provides the types shared between the storefront API server,
//! the cart client, and the CLI:
//! - `storefront` - Cart REST API (axum + `PostgreSQL`)
//! - `cart-client` - Client-side cart store with local fallback
//! - `cli` - Migrations, index repair, seeding, tokens
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Both sides of the wire deserialize the same payload
//! and view types from here, so the JSON contract lives in one place.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, owners, product status
//! - [`cart`] - Selection normalization, lenient request payloads, cart views

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::*;
pub use types::*;
