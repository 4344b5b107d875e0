//! Integration tests for the cart HTTP API.
//!
//! Each test starts the storefront in-process over the memory backend and
//! talks to it over a real socket.

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use abc_shop_core::{CartEnvelope, CartView, ErrorBody, ProductStatus};
use abc_shop_integration_tests::{TestServer, product};

const SESSION_HEADER: &str = "x-session-id";

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .expect("Failed to create HTTP client")
}

async fn post(server: &TestServer, path: &str, session: &str, body: Value) -> reqwest::Response {
    http()
        .post(server.url(path))
        .header(SESSION_HEADER, session)
        .json(&body)
        .send()
        .await
        .expect("Failed to send request")
}

async fn cart_of(response: reqwest::Response) -> CartEnvelope {
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("Failed to parse cart")
}

async fn read_cart(server: &TestServer, session: &str) -> CartView {
    let response = http()
        .get(server.url("/api/cart"))
        .header(SESSION_HEADER, session)
        .send()
        .await
        .expect("Failed to get cart");
    cart_of(response).await.cart
}

async fn error_of(response: reqwest::Response, status: StatusCode) -> String {
    assert_eq!(response.status(), status);
    let body: ErrorBody = response.json().await.expect("Failed to parse error");
    body.message
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::start().await;

    let live = http().get(server.url("/health")).send().await.expect("Failed to get /health");
    assert_eq!(live.status(), StatusCode::OK);

    let ready = http()
        .get(server.url("/health/ready"))
        .send()
        .await
        .expect("Failed to get /health/ready");
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_read_is_empty() {
    let server = TestServer::start().await;

    let response = http()
        .get(server.url("/api/cart"))
        .send()
        .await
        .expect("Failed to get cart");
    let body: Value = response.json().await.expect("Failed to parse cart");

    assert_eq!(body, json!({ "cart": { "items": [], "count": 0, "total": 0 } }));
}

// =============================================================================
// Add / merge
// =============================================================================

#[tokio::test]
async fn test_add_merges_same_selection() {
    let server = TestServer::start().await;
    let item = json!({ "item": { "productId": 1, "quantity": 2, "selectedSize": "M", "selectedColor": "Red" } });

    post(&server, "/api/cart/add", "merge-session", item.clone()).await;
    let cart = cart_of(post(&server, "/api/cart/add", "merge-session", item).await)
        .await
        .cart;

    assert_eq!(cart.count, 1);
    assert_eq!(cart.items[0].quantity, 4);
    assert_eq!(cart.items[0].selected_size.as_deref(), Some("M"));
    assert_eq!(cart.total, Decimal::new(400_000, 0));
}

#[tokio::test]
async fn test_add_splits_different_selections() {
    let server = TestServer::start().await;

    post(
        &server,
        "/api/cart/add",
        "split-session",
        json!({ "item": { "productId": 1, "selectedSize": "M" } }),
    )
    .await;
    let cart = cart_of(
        post(
            &server,
            "/api/cart/add",
            "split-session",
            json!({ "item": { "productId": 1, "selectedSize": "L" } }),
        )
        .await,
    )
    .await
    .cart;

    assert_eq!(cart.count, 2);
    assert!(cart.items.iter().all(|line| line.quantity == 1));
}

#[tokio::test]
async fn test_add_normalizes_loose_fields() {
    let server = TestServer::start().await;

    let cart = cart_of(
        post(
            &server,
            "/api/cart/add",
            "loose-session",
            json!({ "item": {
                "productId": "2",
                "quantity": "3abc",
                "selectedSize": "  ",
                "selectedColor": { "name": "Blue", "value": "#00f" }
            } }),
        )
        .await,
    )
    .await
    .cart;

    let line = &cart.items[0];
    assert_eq!(line.quantity, 3);
    assert_eq!(line.selected_size, None);
    assert_eq!(line.selected_color.as_deref(), Some("Blue"));
}

#[tokio::test]
async fn test_concurrent_adds_produce_one_line() {
    let server = TestServer::start().await;
    let url = server.url("/api/cart/add");
    let item = json!({ "item": { "productId": 3, "quantity": 1, "selectedSize": "S" } });

    let mut adds = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let (url, item) = (url.clone(), item.clone());
        adds.spawn(async move {
            http()
                .post(url)
                .header(SESSION_HEADER, "race-session")
                .json(&item)
                .send()
                .await
                .expect("Failed to send add")
                .status()
        });
    }
    while let Some(status) = adds.join_next().await {
        assert_eq!(status.expect("Add task panicked"), StatusCode::OK);
    }

    let cart = read_cart(&server, "race-session").await;
    assert_eq!(cart.count, 1);
    assert_eq!(cart.items[0].quantity, 10);
}

#[tokio::test]
async fn test_add_rejects_bad_items() {
    let server = TestServer::start().await;

    let missing = post(&server, "/api/cart/add", "bad-session", json!({})).await;
    assert_eq!(error_of(missing, StatusCode::BAD_REQUEST).await, "Invalid item");

    let draft = post(
        &server,
        "/api/cart/add",
        "bad-session",
        json!({ "item": { "productId": 4 } }),
    )
    .await;
    assert_eq!(
        error_of(draft, StatusCode::NOT_FOUND).await,
        "Product not found or unavailable"
    );

    let anonymous = http()
        .post(server.url("/api/cart/add"))
        .json(&json!({ "item": { "productId": 1 } }))
        .send()
        .await
        .expect("Failed to send add");
    assert_eq!(error_of(anonymous, StatusCode::BAD_REQUEST).await, "Session missing");
}

// =============================================================================
// Update / remove / clear
// =============================================================================

#[tokio::test]
async fn test_update_then_remove_by_line_id() {
    let server = TestServer::start().await;
    let cart = cart_of(
        post(
            &server,
            "/api/cart/add",
            "edit-session",
            json!({ "item": { "productId": 1, "selectedSize": "M" } }),
        )
        .await,
    )
    .await
    .cart;
    let id = cart.items[0].id.expect("Server lines carry ids");

    let updated = cart_of(
        post(
            &server,
            "/api/cart/update",
            "edit-session",
            json!({ "item": { "id": id.as_i32(), "quantity": 5, "selectedSize": null } }),
        )
        .await,
    )
    .await
    .cart;
    assert_eq!(updated.items[0].quantity, 5);
    assert_eq!(updated.items[0].selected_size, None);

    let removed = cart_of(
        post(
            &server,
            "/api/cart/remove",
            "edit-session",
            json!({ "item": { "id": id.as_i32() } }),
        )
        .await,
    )
    .await
    .cart;
    assert_eq!(removed.count, 0);
}

#[tokio::test]
async fn test_update_unknown_line_is_not_found() {
    let server = TestServer::start().await;

    let response = post(
        &server,
        "/api/cart/update",
        "missing-session",
        json!({ "item": { "id": 9999, "quantity": 2 } }),
    )
    .await;
    assert_eq!(error_of(response, StatusCode::NOT_FOUND).await, "Cart item not found");
}

#[tokio::test]
async fn test_remove_by_product_and_size() {
    let server = TestServer::start().await;
    for size in ["S", "M"] {
        post(
            &server,
            "/api/cart/add",
            "filter-session",
            json!({ "item": { "productId": 2, "selectedSize": size } }),
        )
        .await;
    }

    let cart = cart_of(
        post(
            &server,
            "/api/cart/remove",
            "filter-session",
            json!({ "item": { "productId": 2, "selectedSize": "S" } }),
        )
        .await,
    )
    .await
    .cart;
    assert_eq!(cart.count, 1);
    assert_eq!(cart.items[0].selected_size.as_deref(), Some("M"));

    let target = post(&server, "/api/cart/remove", "filter-session", json!({ "item": {} })).await;
    assert_eq!(
        error_of(target, StatusCode::BAD_REQUEST).await,
        "Need id or productId"
    );
}

#[tokio::test]
async fn test_clear_empties_cart() {
    let server = TestServer::start().await;
    post(
        &server,
        "/api/cart/add",
        "clear-session",
        json!({ "item": { "productId": 1 } }),
    )
    .await;

    let cart = cart_of(post(&server, "/api/cart/clear", "clear-session", json!({})).await)
        .await
        .cart;
    assert!(cart.is_empty());
}

// =============================================================================
// Identity and catalog
// =============================================================================

#[tokio::test]
async fn test_sessions_are_isolated() {
    let server = TestServer::start().await;
    post(
        &server,
        "/api/cart/add",
        "session-a",
        json!({ "item": { "productId": 1 } }),
    )
    .await;

    assert!(read_cart(&server, "session-b").await.is_empty());
}

#[tokio::test]
async fn test_bearer_cart_follows_token() {
    let server = TestServer::start().await;
    let identity = server.sign_in("shopper@example.com").await;
    let abc_shop_cart_client::Identity::Authenticated { token, .. } = identity else {
        panic!("sign_in returns an authenticated identity");
    };
    let token = secrecy::ExposeSecret::expose_secret(&token).to_string();

    let added = http()
        .post(server.url("/api/cart/add"))
        .bearer_auth(&token)
        .json(&json!({ "item": { "productId": 1, "quantity": 2 } }))
        .send()
        .await
        .expect("Failed to add as user");
    assert_eq!(cart_of(added).await.cart.count, 1);

    let read = http()
        .get(server.url("/api/cart"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to read as user");
    assert_eq!(cart_of(read).await.cart.items[0].quantity, 2);

    let forged = http()
        .get(server.url("/api/cart"))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .expect("Failed to read with bad token");
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_product_is_hidden_not_deleted() {
    let server = TestServer::start().await;
    post(
        &server,
        "/api/cart/add",
        "catalog-session",
        json!({ "item": { "productId": 2 } }),
    )
    .await;

    let catalog = server.state.storage().catalog();
    catalog
        .upsert_product(&product(2, 250_000, ProductStatus::Archived))
        .await
        .expect("Failed to archive product");

    assert!(read_cart(&server, "catalog-session").await.is_empty());

    catalog
        .upsert_product(&product(2, 250_000, ProductStatus::Active))
        .await
        .expect("Failed to reactivate product");
    assert_eq!(read_cart(&server, "catalog-session").await.count, 1);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let server = TestServer::start().await;

    let response = http()
        .get(server.url("/health"))
        .header("x-request-id", "trace-123")
        .send()
        .await
        .expect("Failed to get /health");
    assert_eq!(response.headers()["x-request-id"], "trace-123");
}
