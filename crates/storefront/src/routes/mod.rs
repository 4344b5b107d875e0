//! HTTP route handlers for the cart API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (storage reachable)
//!
//! # Cart (JSON)
//! GET  /api/cart               - Read the caller's cart
//! POST /api/cart/add           - Add an item, merging same product + size + color
//! POST /api/cart/remove        - Remove by line id, or by product with optional filters
//! POST /api/cart/update        - Change a line's quantity and/or size/color
//! POST /api/cart/clear         - Remove every line
//! ```
//!
//! Every cart route responds with `{ "cart": { "items", "count", "total" } }`
//! on success and `{ "message" }` on failure.

pub mod cart;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// Create the cart API router, optionally rate limited per client IP.
pub fn cart_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/api/cart", get(cart::show))
        .route("/api/cart/add", post(cart::add))
        .route("/api/cart/remove", post(cart::remove))
        .route("/api/cart/update", post(cart::update))
        .route("/api/cart/clear", post(cart::clear));

    if rate_limit {
        router.layer(api_rate_limiter())
    } else {
        router
    }
}

/// Create the health check router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}
