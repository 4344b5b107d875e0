//! The cart store: one interface over the remote and local repositories.
//!
//! # Backends
//!
//! | Identity        | Primary                       | Fallback                  |
//! |-----------------|-------------------------------|---------------------------|
//! | Authenticated   | [`RemoteCartRepository`]      | local copy in `cart_v1`   |
//! | Anonymous       | local cart in `cart_session_v1` | none                    |
//!
//! When the primary fails, the same operation is applied to the fallback
//! and the decision is logged. The two may diverge until the next
//! successful round-trip, which overwrites the local copy.
//!
//! Every resulting cart is published to subscribers with `count` and
//! `total` filled in.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use abc_shop_core::{CartItemView, CartView};

use crate::config::CartClientConfig;
use crate::error::CartClientError;
use crate::identity::{CART_KEY, Identity, SESSION_CART_KEY};
use crate::item::{CartItemInput, ItemUpdate, NormalizedItem};
use crate::local::LocalCartRepository;
use crate::remote::RemoteCartRepository;
use crate::repository::CartRepository;
use crate::storage::{KeyValueStorage, timestamp_key};

/// Published carts buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 16;

/// Client-side cart with server sync and local fallback.
pub struct CartStore {
    identity: Identity,
    config: CartClientConfig,
    storage: Arc<dyn KeyValueStorage>,
    primary: Arc<dyn CartRepository>,
    fallback: Option<LocalCartRepository>,
    events: broadcast::Sender<CartView>,
}

impl CartStore {
    /// Build the store for `identity`.
    ///
    /// # Errors
    ///
    /// Returns error if the API client cannot be built for this identity.
    pub fn new(
        config: CartClientConfig,
        identity: Identity,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, CartClientError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self::with_events(config, identity, storage, events)
    }

    fn with_events(
        config: CartClientConfig,
        identity: Identity,
        storage: Arc<dyn KeyValueStorage>,
        events: broadcast::Sender<CartView>,
    ) -> Result<Self, CartClientError> {
        let primary: Arc<dyn CartRepository>;
        let fallback;
        match &identity {
            Identity::Authenticated { .. } => {
                primary = Arc::new(RemoteCartRepository::new(&config, &identity)?);
                fallback = Some(LocalCartRepository::new(storage.clone(), CART_KEY));
            }
            Identity::Anonymous { .. } => {
                primary = Arc::new(LocalCartRepository::new(storage.clone(), SESSION_CART_KEY));
                fallback = None;
            }
        }

        Ok(Self {
            identity,
            config,
            storage,
            primary,
            fallback,
            events,
        })
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Receive every cart the store produces from now on.
    ///
    /// A subscriber that falls behind skips the oldest carts; publishing
    /// never waits for subscribers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartView> {
        self.events.subscribe()
    }

    /// Current cart. Falls back to the cached copy without changing it.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when there is no fallback.
    #[instrument(skip(self), fields(backend = self.primary.name()))]
    pub async fn fetch_cart(&self) -> Result<CartView, CartClientError> {
        match self.primary.fetch().await {
            Ok(cart) => Ok(self.settle(cart)),
            Err(e) => Ok(self.fallback_for("fetch", e)?.load()),
        }
    }

    /// Add an item given in any supported shape.
    ///
    /// # Errors
    ///
    /// Returns `CartClientError::InvalidItem` if the item names no product,
    /// or the primary's error when there is no fallback.
    #[instrument(skip(self, input), fields(backend = self.primary.name()))]
    pub async fn add_item(&self, input: &CartItemInput) -> Result<CartView, CartClientError> {
        let item = input.normalize()?;
        self.add_normalized(&item).await
    }

    async fn add_normalized(&self, item: &NormalizedItem) -> Result<CartView, CartClientError> {
        let cart = match self.primary.add(item).await {
            Ok(cart) => cart,
            Err(e) => self.fallback_for("add", e)?.add(item).await?,
        };
        Ok(self.settle(cart))
    }

    /// Remove a line of the current cart.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when there is no fallback.
    #[instrument(skip(self, item), fields(backend = self.primary.name()))]
    pub async fn remove_item(&self, item: &CartItemView) -> Result<CartView, CartClientError> {
        let cart = match self.primary.remove(item).await {
            Ok(cart) => cart,
            Err(e) => self.fallback_for("remove", e)?.remove(item).await?,
        };
        Ok(self.settle(cart))
    }

    /// Change a line's quantity and/or selection. Quantity 0 removes it.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when there is no fallback.
    #[instrument(skip(self, item, update), fields(backend = self.primary.name()))]
    pub async fn update_item(
        &self,
        item: &CartItemView,
        update: &ItemUpdate,
    ) -> Result<CartView, CartClientError> {
        let cart = match self.primary.update(item, update).await {
            Ok(cart) => cart,
            Err(e) => self.fallback_for("update", e)?.update(item, update).await?,
        };
        Ok(self.settle(cart))
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when there is no fallback.
    #[instrument(skip(self), fields(backend = self.primary.name()))]
    pub async fn clear_cart(&self) -> Result<CartView, CartClientError> {
        let cart = match self.primary.clear().await {
            Ok(cart) => cart,
            Err(e) => self.fallback_for("clear", e)?.clear().await?,
        };
        Ok(self.settle(cart))
    }

    /// Switch the store to `identity`.
    ///
    /// Signing a guest in adds each guest line to the signed-in cart
    /// (merging with what is already there), then clears the guest cart.
    /// Leaving a signed-in identity drops its local copy so the next
    /// identity never sees it. A guest switching to another guest session
    /// keeps the guest cart as is. Subscribers stay subscribed.
    ///
    /// # Errors
    ///
    /// Returns error if the API client cannot be built for `identity` or the
    /// previous local copy cannot be removed.
    #[instrument(skip(self, identity))]
    pub async fn sign_in(self, identity: Identity) -> Result<Self, CartClientError> {
        let leaving_user = self.identity.is_authenticated();
        if leaving_user {
            debug!("Dropping local copy of the previous signed-in cart");
            self.storage.remove(CART_KEY)?;
            self.storage.remove(&timestamp_key(CART_KEY))?;
        }

        let guest = (!leaving_user && identity.is_authenticated())
            .then(|| LocalCartRepository::new(self.storage.clone(), SESSION_CART_KEY));

        let store = Self::with_events(self.config, identity, self.storage, self.events)?;
        if let Some(guest) = guest {
            store.absorb_guest_cart(&guest).await?;
        }
        Ok(store)
    }

    async fn absorb_guest_cart(
        &self,
        guest: &LocalCartRepository,
    ) -> Result<CartView, CartClientError> {
        let lines = guest.load().items;
        if lines.is_empty() {
            return self.fetch_cart().await;
        }

        info!(lines = lines.len(), "Carrying guest cart over to signed-in cart");
        let mut cart = CartView::empty();
        for line in &lines {
            cart = self.add_normalized(&NormalizedItem::from_view(line)).await?;
        }
        guest.clear().await?;
        Ok(cart)
    }

    fn fallback_for(
        &self,
        operation: &'static str,
        error: CartClientError,
    ) -> Result<&LocalCartRepository, CartClientError> {
        match &self.fallback {
            Some(local) => {
                warn!(
                    operation,
                    error = %error,
                    key = local.key(),
                    "Cart API call failed, applying to local copy"
                );
                Ok(local)
            }
            None => Err(error),
        }
    }

    /// Cache a primary result locally and publish it.
    fn settle(&self, cart: CartView) -> CartView {
        let cart = cart.enriched();
        if let Some(local) = &self.fallback {
            local.replace(&cart);
        }
        self.publish(&cart);
        cart
    }

    fn publish(&self, cart: &CartView) {
        if self.events.send(cart.clone()).is_err() {
            debug!("No cart subscribers");
        }
    }
}
