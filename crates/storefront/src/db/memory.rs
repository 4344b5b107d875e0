//! In-memory storage backend.
//!
//! Implements every repository trait over one mutex-guarded state, with the
//! same line identity rule as the `PostgreSQL` unique indexes. Data is lost
//! on restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use abc_shop_core::{CartLineId, Email, Owner, ProductId, Selection, UserId};

use super::{AccessTokenStore, CartLineStore, ProductCatalog, RepositoryError};
use crate::models::{
    ApiToken, CartLine, LineChanges, LineFilter, NewCartLine, NewProduct, Product, User,
};

#[derive(Default)]
struct State {
    next_line_id: i32,
    next_user_id: i32,
    lines: BTreeMap<CartLineId, CartLine>,
    products: HashMap<ProductId, Product>,
    users: Vec<User>,
    tokens: HashMap<String, ApiToken>,
}

impl State {
    fn find_line(
        &self,
        owner: &Owner,
        product_id: ProductId,
        selection: &Selection,
    ) -> Option<CartLineId> {
        self.lines
            .values()
            .find(|line| {
                &line.owner == owner
                    && line.product_id == product_id
                    && &line.selection == selection
            })
            .map(|line| line.id)
    }
}

fn removed(before: usize, after: usize) -> u64 {
    u64::try_from(before.saturating_sub(after)).unwrap_or(u64::MAX)
}

/// Process-local store for carts, products and tokens.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = NewProduct>) -> Self {
        let products = products
            .into_iter()
            .map(|p| (p.id, Product::from(p)))
            .collect();
        Self {
            state: Mutex::new(State {
                products,
                ..State::default()
            }),
        }
    }

    /// Number of stored lines across all owners, including lines whose
    /// product is hidden.
    pub async fn line_count(&self) -> usize {
        self.state.lock().await.lines.len()
    }
}

#[async_trait]
impl CartLineStore for MemoryStore {
    async fn lines_for(&self, owner: &Owner) -> Result<Vec<CartLine>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .lines
            .values()
            .filter(|line| &line.owner == owner)
            .cloned()
            .collect())
    }

    async fn upsert(&self, line: &NewCartLine) -> Result<CartLine, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if let Some(id) = state.find_line(&line.owner, line.product_id, &line.selection)
            && let Some(existing) = state.lines.get_mut(&id)
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        state.next_line_id += 1;
        let stored = CartLine {
            id: CartLineId::new(state.next_line_id),
            owner: line.owner.clone(),
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
            selection: line.selection.clone(),
            created_at: now,
            updated_at: now,
        };
        state.lines.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_line(&self, owner: &Owner, id: CartLineId) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.lines.get(&id).is_some_and(|line| &line.owner == owner) {
            state.lines.remove(&id);
            return Ok(1);
        }
        Ok(0)
    }

    async fn delete_matching(
        &self,
        owner: &Owner,
        filter: &LineFilter,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.lines.len();
        state
            .lines
            .retain(|_, line| !(&line.owner == owner && filter.matches(line)));
        Ok(removed(before, state.lines.len()))
    }

    async fn update_line(
        &self,
        owner: &Owner,
        id: CartLineId,
        changes: &LineChanges,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(current) = state.lines.get(&id).filter(|l| &l.owner == owner).cloned() else {
            return Ok(None);
        };
        let (quantity, selection) = changes.apply_to(&current);
        let now = Utc::now();

        let collision = state
            .find_line(owner, current.product_id, &selection)
            .filter(|other| *other != id);
        if let Some(other_id) = collision {
            state.lines.remove(&id);
            let Some(other) = state.lines.get_mut(&other_id) else {
                return Err(RepositoryError::NotFound);
            };
            other.quantity = other.quantity.saturating_add(quantity);
            other.updated_at = now;
            return Ok(Some(other.clone()));
        }

        let Some(line) = state.lines.get_mut(&id) else {
            return Err(RepositoryError::NotFound);
        };
        line.quantity = quantity;
        line.selection = selection;
        line.updated_at = now;
        Ok(Some(line.clone()))
    }

    async fn clear(&self, owner: &Owner) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().await;
        let before = state.lines.len();
        state.lines.retain(|_, line| &line.owner != owner);
        Ok(removed(before, state.lines.len()))
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn active_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.products.get(&id).filter(|p| p.is_active()).cloned())
    }

    async fn active_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id))
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn upsert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let product = Product::from(product.clone());
        state.products.insert(product.id, product.clone());
        Ok(product)
    }
}

#[async_trait]
impl AccessTokenStore for MemoryStore {
    async fn find_token(&self, token_hash: &str) -> Result<Option<ApiToken>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(token_hash).cloned())
    }

    async fn ensure_user(&self, email: &Email) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter().find(|u| &u.email == email) {
            return Ok(user.clone());
        }

        state.next_user_id += 1;
        let user = User {
            id: UserId::new(state.next_user_id),
            email: email.clone(),
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn insert_token(&self, token: &ApiToken) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.tokens.contains_key(&token.token_hash) {
            return Err(RepositoryError::Conflict("token already issued".to_owned()));
        }
        state.tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use abc_shop_core::{ProductStatus, SessionId};

    use super::*;

    fn session(id: &str) -> Owner {
        Owner::Session(SessionId::parse(id).unwrap())
    }

    fn new_line(owner: &Owner, size: Option<&str>, color: Option<&str>, quantity: i32) -> NewCartLine {
        NewCartLine {
            owner: owner.clone(),
            product_id: ProductId::new(1),
            variant_id: None,
            quantity,
            selection: Selection::new(size, color),
        }
    }

    #[tokio::test]
    async fn test_upsert_merges_same_selection() {
        let store = MemoryStore::new();
        let owner = session("guest-1");

        let first = store.upsert(&new_line(&owner, Some("M"), Some("Red"), 1)).await.unwrap();
        let second = store.upsert(&new_line(&owner, Some("M"), Some("Red"), 2)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 3);
        assert_eq!(store.line_count().await, 1);
    }

    #[tokio::test]
    async fn test_merged_quantity_saturates() {
        let store = MemoryStore::new();
        let owner = session("guest-1");

        store.upsert(&new_line(&owner, None, None, i32::MAX)).await.unwrap();
        let merged = store.upsert(&new_line(&owner, None, None, 1)).await.unwrap();

        assert_eq!(merged.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn test_upsert_separates_sizes_and_owners() {
        let store = MemoryStore::new();
        let a = session("guest-a");
        let b = session("guest-b");

        store.upsert(&new_line(&a, Some("M"), None, 1)).await.unwrap();
        store.upsert(&new_line(&a, Some("L"), None, 1)).await.unwrap();
        store.upsert(&new_line(&b, Some("M"), None, 1)).await.unwrap();

        assert_eq!(store.lines_for(&a).await.unwrap().len(), 2);
        assert_eq!(store.lines_for(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_line_is_owner_scoped() {
        let store = MemoryStore::new();
        let a = session("guest-a");
        let b = session("guest-b");
        let line = store.upsert(&new_line(&a, None, None, 1)).await.unwrap();

        assert_eq!(store.delete_line(&b, line.id).await.unwrap(), 0);
        assert_eq!(store.delete_line(&a, line.id).await.unwrap(), 1);
        assert!(store.lines_for(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_folds_colliding_selection() {
        let store = MemoryStore::new();
        let owner = session("guest-1");
        let medium = store.upsert(&new_line(&owner, Some("M"), None, 2)).await.unwrap();
        let large = store.upsert(&new_line(&owner, Some("L"), None, 3)).await.unwrap();

        let changes = LineChanges {
            size: Some(Some("L".to_string())),
            ..LineChanges::default()
        };
        let merged = store
            .update_line(&owner, medium.id, &changes)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.id, large.id);
        assert_eq!(merged.quantity, 5);
        assert_eq!(store.lines_for(&owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_line() {
        let store = MemoryStore::new();
        let result = store
            .update_line(&session("guest-1"), CartLineId::new(42), &LineChanges::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_catalog_hides_inactive() {
        let store = MemoryStore::with_products([
            NewProduct {
                id: ProductId::new(1),
                name: "Tee".to_string(),
                price: Decimal::new(10, 0),
                original_price: None,
                image_url: None,
                stock_quantity: None,
                status: ProductStatus::Active,
            },
            NewProduct {
                id: ProductId::new(2),
                name: "Old Tee".to_string(),
                price: Decimal::new(10, 0),
                original_price: None,
                image_url: None,
                stock_quantity: None,
                status: ProductStatus::Archived,
            },
        ]);

        assert!(store.active_product(ProductId::new(1)).await.unwrap().is_some());
        assert!(store.active_product(ProductId::new(2)).await.unwrap().is_none());
        let found = store
            .active_products(&[ProductId::new(1), ProductId::new(2), ProductId::new(3)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let store = MemoryStore::new();
        let email = Email::parse("shopper@example.com").unwrap();
        let first = store.ensure_user(&email).await.unwrap();
        let second = store.ensure_user(&email).await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
