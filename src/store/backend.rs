//! Durable keyed map abstraction and helpers.
//!
//! The `DurableMap` trait is the only thing `BookmarkStore` knows
//! about persistence. Each realization is built from a root location
//! plus a key-extraction function, and persists every value as an
//! individually addressable unit so the whole map can be rebuilt by
//! reopening the same location.

use std::path::Path;

use anyhow::Result;

use crate::models::{Bookmark, Locator, StoreBackendKind, StoreConfig};

/// Extracts the key a value is stored under.
pub type KeyFn<K, V> = fn(&V) -> K;

/// Persistent map from keys to self-describing values.
///
/// Implementations are not synchronized; callers that share a map
/// across threads wrap it in a lock.
pub trait DurableMap<K, V> {
    /// Kind of backend implementation.
    fn kind(&self) -> StoreBackendKind;

    /// Root location the map was opened at.
    fn root(&self) -> &Path;

    /// Look up the value stored under `key`.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Persist `value` under its own extracted key, overwriting any
    /// previous entry.
    fn add(&mut self, value: V) -> Result<()>;

    /// Remove the entry stored under `key`, returning it.
    fn remove(&mut self, key: &K) -> Result<Option<V>>;

    /// Remove the entry stored under `value`'s key, but only when the
    /// stored value is equal to `value`.
    fn remove_by_value(&mut self, value: &V) -> Result<Option<V>>;

    /// Every stored value, in the map's own iteration order.
    fn values(&self) -> Result<Vec<V>>;
}

/// Durable map specialized to bookmarks, as held by the store.
pub type BookmarkMap = Box<dyn DurableMap<Locator, Bookmark> + Send>;

fn bookmark_key(bookmark: &Bookmark) -> Locator {
    bookmark.url.clone()
}

/// Helper to construct the configured bookmark backend.
pub fn open_backend(config: &StoreConfig) -> Result<BookmarkMap> {
    match config.backend {
        StoreBackendKind::File => Ok(Box::new(crate::store::JsonDirMap::open(
            &config.path,
            bookmark_key,
        )?)),
        StoreBackendKind::Sqlite => Ok(Box::new(crate::store::SqliteMap::open(
            &config.path,
            bookmark_key,
        )?)),
    }
}
