//! Domain models for the cart service.
//!
//! These types represent validated domain objects separate from database row
//! types; repositories convert rows into them and reject malformed data.

pub mod cart_line;
pub mod product;
pub mod user;

pub use cart_line::{CartLine, LineChanges, LineFilter, NewCartLine};
pub use product::{NewProduct, Product};
pub use user::{ApiToken, User};
