//! Carts held by the cart REST API.
//!
//! The caller is identified on every request: `Authorization: Bearer` for
//! signed-in users, `x-session-id` for guests.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::instrument;

use abc_shop_core::{
    CartEnvelope, CartItemView, CartView, ColorInput, ErrorBody, ItemEnvelope, RemoveItemRequest,
};

use crate::config::CartClientConfig;
use crate::error::CartClientError;
use crate::identity::Identity;
use crate::item::{ItemUpdate, NormalizedItem};
use crate::repository::CartRepository;

/// Header carrying a guest's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Cart API client.
#[derive(Clone)]
pub struct RemoteCartRepository {
    client: reqwest::Client,
    config: CartClientConfig,
}

impl RemoteCartRepository {
    /// Create a client that identifies every request as `identity`.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials are not valid header values or the
    /// HTTP client fails to build.
    pub fn new(config: &CartClientConfig, identity: &Identity) -> Result<Self, CartClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        match identity {
            Identity::Authenticated { token, .. } => {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                        .map_err(|e| CartClientError::Config(format!("invalid token: {e}")))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Identity::Anonymous { session_id } => {
                let value = HeaderValue::from_str(session_id.as_str())
                    .map_err(|e| CartClientError::Config(format!("invalid session id: {e}")))?;
                headers.insert(HeaderName::from_static(SESSION_HEADER), value);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn get(&self, path: &str) -> Result<CartView, CartClientError> {
        let response = self.client.get(self.config.endpoint(path)?).send().await?;
        Self::handle_response(response).await
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<CartView, CartClientError> {
        let mut request = self.client.post(self.config.endpoint(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::handle_response(request.send().await?).await
    }

    /// Unwrap `{ "cart": ... }`, or turn `{ "message": ... }` into an error.
    async fn handle_response(response: reqwest::Response) -> Result<CartView, CartClientError> {
        let status = response.status();

        if status.is_success() {
            let envelope: CartEnvelope = response
                .json()
                .await
                .map_err(|e| CartClientError::Parse(format!("Failed to parse cart: {e}")))?;
            return Ok(envelope.cart.enriched());
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };
        Err(CartClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CartRepository for RemoteCartRepository {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<CartView, CartClientError> {
        self.get("/api/cart").await
    }

    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    async fn add(&self, item: &NormalizedItem) -> Result<CartView, CartClientError> {
        self.post("/api/cart/add", Some(&ItemEnvelope::new(item.to_request())))
            .await
    }

    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    async fn remove(&self, item: &CartItemView) -> Result<CartView, CartClientError> {
        // A line id pins the exact row; without one, target the selection.
        let request = match item.id {
            Some(id) => RemoveItemRequest {
                id: Some(id),
                ..RemoveItemRequest::default()
            },
            None => RemoveItemRequest {
                id: None,
                product_id: Some(item.product_id),
                variant_id: item.variant_id,
                selected_size: item.selected_size.clone(),
                selected_color: item.selected_color.as_deref().map(ColorInput::from),
            },
        };
        self.post("/api/cart/remove", Some(&ItemEnvelope::new(request)))
            .await
    }

    #[instrument(skip(self, item, update), fields(product_id = %item.product_id))]
    async fn update(
        &self,
        item: &CartItemView,
        update: &ItemUpdate,
    ) -> Result<CartView, CartClientError> {
        let id = item
            .id
            .ok_or_else(|| CartClientError::InvalidItem("cart line has no id".to_string()))?;
        self.post("/api/cart/update", Some(&ItemEnvelope::new(update.to_request(id))))
            .await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<CartView, CartClientError> {
        self.post::<()>("/api/cart/clear", None).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Json, Router,
        http::{HeaderMap as AxumHeaders, StatusCode},
        routing::{get, post},
    };
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use abc_shop_core::{ProductId, SessionId, UserId};

    use super::*;
    use crate::item::CartItemInput;

    async fn spawn(router: Router) -> CartClientConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        CartClientConfig::new(&format!("http://{addr}")).unwrap()
    }

    fn echo_identity(headers: &AxumHeaders) -> Value {
        let who = headers
            .get("authorization")
            .or_else(|| headers.get(SESSION_HEADER))
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        json!({"cart": {"items": [{"productId": 1, "name": who, "price": 5, "quantity": 2}]}})
    }

    #[tokio::test]
    async fn test_identity_headers_and_enrichment() {
        let router = Router::new().route(
            "/api/cart",
            get(|headers: AxumHeaders| async move { Json(echo_identity(&headers)) }),
        );
        let config = spawn(router).await;

        let user = Identity::Authenticated {
            user_id: UserId::new(1),
            token: SecretString::from("abc"),
        };
        let cart = RemoteCartRepository::new(&config, &user)
            .unwrap()
            .fetch()
            .await
            .unwrap();
        assert_eq!(cart.items.first().unwrap().name, "Bearer abc");
        assert_eq!(cart.count, 1);
        assert_eq!(cart.total, rust_decimal::Decimal::new(10, 0));

        let guest = Identity::Anonymous {
            session_id: SessionId::parse("guest-9").unwrap(),
        };
        let cart = RemoteCartRepository::new(&config, &guest)
            .unwrap()
            .fetch()
            .await
            .unwrap();
        assert_eq!(cart.items.first().unwrap().name, "guest-9");
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let router = Router::new().route(
            "/api/cart/add",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"message": "Product not found or unavailable"})),
                )
            }),
        );
        let config = spawn(router).await;
        let guest = Identity::Anonymous {
            session_id: SessionId::parse("guest-1").unwrap(),
        };
        let repo = RemoteCartRepository::new(&config, &guest).unwrap();
        let item = CartItemInput::product(ProductId::new(9)).normalize().unwrap();

        match repo.add(&item).await {
            Err(CartClientError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Product not found or unavailable");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_needs_line_id() {
        let config = CartClientConfig::new("http://127.0.0.1:9").unwrap();
        let guest = Identity::Anonymous {
            session_id: SessionId::parse("guest-1").unwrap(),
        };
        let repo = RemoteCartRepository::new(&config, &guest).unwrap();
        let line = CartItemInput::product(ProductId::new(1))
            .normalize()
            .unwrap()
            .to_view();
        assert!(matches!(
            repo.update(&line, &ItemUpdate::quantity(2)).await,
            Err(CartClientError::InvalidItem(_))
        ));
    }
}
