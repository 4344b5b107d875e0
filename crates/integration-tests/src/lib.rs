//! Integration tests for ABC Shop.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (memory backend, ephemeral port)
//! cargo test -p abc-shop-integration-tests
//!
//! # Including the PostgreSQL tests
//! TEST_DATABASE_URL=postgres://localhost/abc_shop_test \
//!     cargo test -p abc-shop-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_api` - HTTP contract of the cart API
//! - `cart_client` - Cart store against a live server, including fallback
//! - `postgres_cart` - Repository and index behavior on a real database

use std::net::SocketAddr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use abc_shop_cart_client::{CartClientConfig, Identity};
use abc_shop_core::{Email, ProductId, ProductStatus, SessionId};
use abc_shop_storefront::config::StorefrontConfig;
use abc_shop_storefront::db::{MemoryStore, Storage};
use abc_shop_storefront::models::NewProduct;
use abc_shop_storefront::services::issue_token;
use abc_shop_storefront::state::AppState;

/// Pepper used by every test server.
pub const TEST_PEPPER: &str = "Zq8vN3xLm5Tb2Wc7Rk9Hd4Fy6Gp1Js0A";

/// A product for the test catalog.
#[must_use]
pub fn product(id: i32, price: i64, status: ProductStatus) -> NewProduct {
    NewProduct {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Decimal::new(price, 0),
        original_price: None,
        image_url: Some(format!("https://cdn.example.com/{id}.jpg")),
        stock_quantity: None,
        status,
    }
}

/// Products 1-3 active, 4 draft, 5 archived.
#[must_use]
pub fn sample_products() -> Vec<NewProduct> {
    vec![
        product(1, 100_000, ProductStatus::Active),
        product(2, 250_000, ProductStatus::Active),
        product(3, 75_000, ProductStatus::Active),
        product(4, 50_000, ProductStatus::Draft),
        product(5, 20_000, ProductStatus::Archived),
    ]
}

/// A guest identity with a unique session id.
///
/// # Panics
///
/// Never; generated ids are always valid.
#[must_use]
pub fn guest() -> Identity {
    let session_id = SessionId::parse(&format!("test-{}", uuid::Uuid::new_v4()))
        .expect("Generated session id rejected");
    Identity::Anonymous { session_id }
}

/// The storefront running in-process on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server over an in-memory store holding [`sample_products`].
    pub async fn start() -> Self {
        Self::with_storage(Storage::memory(MemoryStore::with_products(sample_products()))).await
    }

    /// Start a server over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn with_storage(storage: Storage) -> Self {
        let config = StorefrontConfig::in_memory(SecretString::from(TEST_PEPPER));
        let state = AppState::new(config, storage);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read listener address");

        let (tx, rx) = oneshot::channel::<()>();
        let router = abc_shop_storefront::app(state.clone());
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = abc_shop_storefront::serve(listener, router, shutdown).await {
                panic!("test server failed: {e}");
            }
        });

        Self {
            addr,
            state,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Cart client configuration pointing at this server.
    ///
    /// # Panics
    ///
    /// Never; the address is always a valid URL.
    #[must_use]
    pub fn client_config(&self) -> CartClientConfig {
        CartClientConfig::new(&self.url(""))
            .expect("Test server URL rejected")
    }

    /// Issue a token for `email` and return the signed-in identity.
    ///
    /// # Panics
    ///
    /// Panics if the email is invalid or the token cannot be stored.
    pub async fn sign_in(&self, email: &str) -> Identity {
        let email = Email::parse(email).expect("Bad test email");
        let issued = issue_token(
            self.state.storage().tokens(),
            self.state.tokens(),
            &email,
            Some("integration-test".to_string()),
            None,
        )
        .await
        .expect("Failed to issue token");

        Identity::Authenticated {
            user_id: issued.user_id,
            token: issued.token,
        }
    }

    /// Stop accepting requests and wait for the server to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Pool for the database named by `TEST_DATABASE_URL`, with migrations
/// applied.
///
/// # Panics
///
/// Panics if the variable is unset, the database is unreachable, or a
/// migration fails.
pub async fn migrated_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for PostgreSQL tests");
    let pool = abc_shop_storefront::db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate test database");
    pool
}
