//! Key/value storage for locally held carts.
//!
//! Carts are stored as JSON `{ "items": [...] }` under their key, with a
//! `<key>_ts` companion holding the write time in epoch milliseconds so
//! watchers see a change even when the payload is identical.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;

use abc_shop_core::CartView;

use crate::error::StorageError;

/// Minimal string key/value store.
pub trait KeyValueStorage: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`, created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        let io = |source| StorageError::Io {
            key: key.to_owned(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io)?;
        std::fs::write(path, value).map_err(io)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

/// Companion key holding the last write time of `key`.
#[must_use]
pub fn timestamp_key(key: &str) -> String {
    format!("{key}_ts")
}

/// The cart stored under `key`, or an empty cart if there is none or it
/// cannot be read.
pub fn load_cart(storage: &dyn KeyValueStorage, key: &str) -> CartView {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return CartView::empty(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored cart");
            return CartView::empty();
        }
    };

    match serde_json::from_str::<CartView>(&raw) {
        Ok(cart) => cart.enriched(),
        Err(e) => {
            warn!(key, error = %e, "Discarding unreadable stored cart");
            CartView::empty()
        }
    }
}

/// Store `cart` under `key` and stamp `<key>_ts`. Failures are logged and
/// otherwise ignored.
pub fn save_cart(storage: &dyn KeyValueStorage, key: &str, cart: &CartView) {
    let payload = match serde_json::to_string(cart) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(key, error = %e, "Failed to serialize cart");
            return;
        }
    };

    let written = storage.set(key, &payload).and_then(|()| {
        storage.set(
            &timestamp_key(key),
            &Utc::now().timestamp_millis().to_string(),
        )
    });
    if let Err(e) = written {
        warn!(key, error = %e, "Failed to write cart to storage");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use abc_shop_core::{CartItemView, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn cart() -> CartView {
        CartView::from_items(vec![CartItemView {
            id: None,
            product_id: ProductId::new(3),
            variant_id: None,
            name: "Tee".to_string(),
            image: None,
            price: Decimal::new(15, 0),
            original_price: None,
            quantity: 2,
            selected_size: Some("M".to_string()),
            selected_color: None,
            size: None,
            color: None,
            in_stock: true,
        }])
    }

    #[test]
    fn test_save_and_load_with_timestamp() {
        let storage = MemoryStorage::new();
        save_cart(&storage, "cart_v1", &cart());

        assert_eq!(load_cart(&storage, "cart_v1"), cart());
        let ts: i64 = storage.get("cart_v1_ts").unwrap().unwrap().parse().unwrap();
        assert!(ts > 0);
    }

    #[test]
    fn test_items_only_payload_is_enriched() {
        let storage = MemoryStorage::new();
        storage
            .set(
                "cart_session_v1",
                r#"{"items":[{"productId":3,"price":15,"quantity":2}]}"#,
            )
            .unwrap();
        let loaded = load_cart(&storage, "cart_session_v1");
        assert_eq!(loaded.count, 1);
        assert_eq!(loaded.total, Decimal::new(30, 0));
    }

    #[test]
    fn test_garbage_loads_as_empty() {
        let storage = MemoryStorage::new();
        storage.set("cart_v1", "{oops").unwrap();
        assert!(load_cart(&storage, "cart_v1").is_empty());
        assert!(load_cart(&storage, "missing").is_empty());
    }

    #[test]
    fn test_file_storage() {
        let dir = std::env::temp_dir().join(format!("abc-cart-{}", uuid::Uuid::new_v4()));
        let storage = FileStorage::new(&dir);

        assert_eq!(storage.get("cart_v1").unwrap(), None);
        storage.set("cart_v1", "{}").unwrap();
        assert_eq!(storage.get("cart_v1").unwrap().as_deref(), Some("{}"));
        storage.remove("cart_v1").unwrap();
        storage.remove("cart_v1").unwrap();
        assert_eq!(storage.get("cart_v1").unwrap(), None);
        assert!(matches!(
            storage.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
