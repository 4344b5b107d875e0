//! ABC Shop storefront library.
//!
//! The cart REST API as a library, so the binary, the CLI and the
//! integration tests build the same router over the same storage.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, header},
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use config::{ConfigError, StorageBackend, StorefrontConfig};
use db::seed::{ProductSeed, SeedError};
use db::{MemoryStore, Storage};
use services::CachedCatalog;
use state::AppState;

/// Errors while bringing the storefront up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("postgres storage selected but no database URL configured")]
    MissingDatabaseUrl,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the storage backend selected by `config`.
///
/// The memory backend is seeded from `seed_file` when one is configured.
/// The catalog is wrapped in a TTL cache only when a non-zero TTL is
/// configured.
///
/// # Errors
///
/// Returns `StartupError` if the database is unreachable or the seed file
/// cannot be loaded.
pub async fn build_storage(config: &StorefrontConfig) -> Result<Storage, StartupError> {
    let storage = match config.storage {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_ref()
                .ok_or(StartupError::MissingDatabaseUrl)?;
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");
            Storage::postgres(pool)
        }
        StorageBackend::Memory => {
            let store = match &config.seed_file {
                Some(path) => {
                    let seed = ProductSeed::from_file(path).await?;
                    tracing::info!(
                        products = seed.products.len(),
                        path = %path.display(),
                        "Seeded in-memory catalog"
                    );
                    MemoryStore::with_products(seed.products)
                }
                None => MemoryStore::new(),
            };
            tracing::warn!("Using in-memory storage; carts are lost on restart");
            Storage::memory(store)
        }
    };

    Ok(with_catalog_cache(storage, config.product_cache_ttl))
}

/// Put a TTL cache in front of the catalog. A zero TTL leaves it uncached.
#[must_use]
pub fn with_catalog_cache(storage: Storage, ttl: Duration) -> Storage {
    if ttl.is_zero() {
        return storage;
    }
    tracing::info!(ttl_secs = ttl.as_secs(), "Caching active products");
    let cached = CachedCatalog::new(storage.catalog_handle(), ttl);
    storage.with_catalog(Arc::new(cached))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::SESSION_HEADER),
            HeaderName::from_static(middleware::REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(middleware::REQUEST_ID_HEADER)])
}

/// Build the application router.
///
/// Sentry layers are not included; the binary adds them outermost.
pub fn app(state: AppState) -> Router {
    let config = state.config();
    let cors = cors_layer(&config.allowed_origins);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
            owner = tracing::field::Empty,
        )
    });

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::cart_routes(config.rate_limit))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(trace)
        .layer(cors)
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// Peer addresses are made available for per-IP rate limiting.
///
/// # Errors
///
/// Returns `std::io::Error` if the server fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
