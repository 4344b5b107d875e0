//! Core types for ABC Shop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod owner;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use owner::{Owner, SessionId, SessionIdError};
pub use status::{ProductStatus, UnknownStatus};
