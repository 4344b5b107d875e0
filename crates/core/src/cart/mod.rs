//! Cart domain types shared by the server and the client store.
//!
//! - [`selection`] - size/color normalization and the line equality key
//! - [`input`] - lenient request payloads (`{ "item": { ... } }`)
//! - [`view`] - denormalized cart responses

pub mod input;
pub mod selection;
pub mod view;

pub use input::{
    AddItemRequest, ColorInput, ItemEnvelope, LooseInt, RemoveItemRequest, UpdateItemRequest,
    add_quantity, update_quantity,
};
pub use selection::{LineKey, Selection, normalize_field};
pub use view::{CartEnvelope, CartItemView, CartView, ErrorBody, line_total};
