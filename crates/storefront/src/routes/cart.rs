//! Cart route handlers.
//!
//! Bodies are `{ "item": { ... } }`. A body that is missing or does not
//! parse is answered like a missing item.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{debug, instrument};

use abc_shop_core::{
    AddItemRequest, CartEnvelope, ItemEnvelope, RemoveItemRequest, UpdateItemRequest,
};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::Caller;
use crate::services::{CartError, CartService};
use crate::state::AppState;

type Body<T> = std::result::Result<Json<ItemEnvelope<T>>, JsonRejection>;

/// The `item` of a request body, or `InvalidItem` if the body was unusable.
fn item<T>(body: Body<T>) -> Result<Option<T>> {
    match body {
        Ok(Json(envelope)) => Ok(envelope.item),
        Err(rejection) => {
            debug!(%rejection, "Rejected cart request body");
            Err(AppError::Cart(CartError::InvalidItem))
        }
    }
}

/// `GET /api/cart`
#[instrument(skip(state, caller))]
pub async fn show(State(state): State<AppState>, caller: Caller) -> Result<Json<CartEnvelope>> {
    let cart = CartService::from_storage(state.storage())
        .read(caller.owner())
        .await?;
    Ok(Json(CartEnvelope { cart }))
}

/// `POST /api/cart/add`
#[instrument(skip(state, caller, body))]
pub async fn add(
    State(state): State<AppState>,
    caller: Caller,
    body: Body<AddItemRequest>,
) -> Result<Json<CartEnvelope>> {
    let item = item(body)?;
    let cart = CartService::from_storage(state.storage())
        .add(caller.owner(), item.as_ref())
        .await?;

    if let Some(product_id) = item.as_ref().and_then(|i| i.product_id) {
        let product_id = product_id.to_string();
        add_breadcrumb("cart", "Added item", Some(&[("product_id", &product_id)]));
    }

    Ok(Json(CartEnvelope { cart }))
}

/// `POST /api/cart/remove`
#[instrument(skip(state, caller, body))]
pub async fn remove(
    State(state): State<AppState>,
    caller: Caller,
    body: Body<RemoveItemRequest>,
) -> Result<Json<CartEnvelope>> {
    let item = item(body)?;
    let cart = CartService::from_storage(state.storage())
        .remove(caller.owner(), item.as_ref())
        .await?;
    Ok(Json(CartEnvelope { cart }))
}

/// `POST /api/cart/update`
#[instrument(skip(state, caller, body))]
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    body: Body<UpdateItemRequest>,
) -> Result<Json<CartEnvelope>> {
    let item = item(body)?;
    let cart = CartService::from_storage(state.storage())
        .update(caller.owner(), item.as_ref())
        .await?;
    Ok(Json(CartEnvelope { cart }))
}

/// `POST /api/cart/clear`
#[instrument(skip(state, caller))]
pub async fn clear(State(state): State<AppState>, caller: Caller) -> Result<Json<CartEnvelope>> {
    let cart = CartService::from_storage(state.storage())
        .clear(caller.owner())
        .await?;
    add_breadcrumb("cart", "Cleared cart", None);
    Ok(Json(CartEnvelope { cart }))
}
