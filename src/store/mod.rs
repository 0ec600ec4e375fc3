//! The authoritative bookmark store.
//!
//! `BookmarkStore` wraps a `DurableMap` keyed by `Locator` and owns
//! the timestamp rules every record passes through:
//!
//! - A record without a creation timestamp inherits the one already
//!   stored for its locator, or gets "now".
//! - A record without a modification timestamp always gets "now".
//!
//! Every public operation runs under one store-wide mutex, so `add`
//! and `replace` observe a consistent view between their read and
//! their write. Persistence calls happen while the lock is held.

mod backend;
mod json_dir;
mod sqlite;

pub use backend::{open_backend, BookmarkMap, DurableMap, KeyFn};
pub use json_dir::JsonDirMap;
pub use sqlite::SqliteMap;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use time::OffsetDateTime;

use crate::models::{Bookmark, ImportSummary, Locator, StoreBackendKind, StoreConfig};

/// Source of "now" for every timestamp the store assigns.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// The system clock in UTC.
pub fn system_clock() -> Clock {
    Arc::new(OffsetDateTime::now_utc)
}

/// Thread-safe bookmark collection with durable backing.
pub struct BookmarkStore {
    map: Mutex<BookmarkMap>,
    clock: Clock,
    kind: StoreBackendKind,
}

impl BookmarkStore {
    /// Open (or create) the configured store and migrate legacy records.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Self::open_with_clock(config, system_clock())
    }

    /// Like `open`, with an explicit clock.
    pub fn open_with_clock(config: &StoreConfig, clock: Clock) -> Result<Self> {
        let map = open_backend(config)?;
        Ok(Self::from_map(map, clock))
    }

    /// Wrap an already opened map. Runs the structure migration pass.
    pub fn from_map(map: BookmarkMap, clock: Clock) -> Self {
        let kind = map.kind();
        let store = Self {
            map: Mutex::new(map),
            clock,
            kind,
        };
        store.migrate_structure();
        store
    }

    pub fn kind(&self) -> StoreBackendKind {
        self.kind
    }

    /// Look up the bookmark stored under `locator`.
    pub fn get(&self, locator: &Locator) -> Result<Option<Bookmark>> {
        let map = self.lock()?;
        map.get(locator)
    }

    /// Insert or update a bookmark, filling in missing timestamps.
    pub fn add(&self, bookmark: Bookmark) -> Result<Bookmark> {
        let mut map = self.lock()?;
        let now = (self.clock)();
        add_locked(&mut **map, bookmark, now)
    }

    /// Remove the stored bookmark equal to `bookmark`.
    ///
    /// Nothing is removed when the stored record for that locator has
    /// changed since `bookmark` was read.
    pub fn remove_bookmark(&self, bookmark: &Bookmark) -> Result<Option<Bookmark>> {
        let mut map = self.lock()?;
        map.remove_by_value(bookmark)
    }

    /// Remove whatever is stored under `locator`.
    pub fn remove(&self, locator: &Locator) -> Result<Option<Bookmark>> {
        let mut map = self.lock()?;
        map.remove(locator)
    }

    /// Upsert `bookmark` and, when its locator differs from
    /// `replacing`, drop the entry stored under `replacing`.
    ///
    /// The upsert is committed before the removal, so a failed removal
    /// never loses the new record.
    pub fn replace(&self, replacing: &Locator, bookmark: Bookmark) -> Result<Bookmark> {
        let mut map = self.lock()?;
        let now = (self.clock)();
        let result = add_locked(&mut **map, bookmark, now)?;
        if &result.url != replacing {
            map.remove(replacing)?;
        }
        Ok(result)
    }

    /// Record a visit: bump the visit count and set `last_visited`.
    ///
    /// Creation and modification timestamps are left untouched.
    pub fn visit(&self, locator: &Locator) -> Result<Option<Bookmark>> {
        let mut map = self.lock()?;
        let Some(mut bookmark) = map.get(locator)? else {
            return Ok(None);
        };

        let now = (self.clock)();
        bookmark.visit_count = Some(bookmark.visit_count.unwrap_or(0).saturating_add(1));
        bookmark.last_visited = Some(now);
        add_locked(&mut **map, bookmark, now).map(Some)
    }

    /// Upsert many bookmarks under a single lock acquisition.
    ///
    /// Caller-supplied timestamps are kept as-is; absent ones follow
    /// the same rules as `add`.
    pub fn import(&self, bookmarks: Vec<Bookmark>) -> Result<ImportSummary> {
        let mut map = self.lock()?;
        let now = (self.clock)();
        let mut summary = ImportSummary::default();

        for bookmark in bookmarks {
            if map.get(&bookmark.url)?.is_some() {
                summary.updated += 1;
            } else {
                summary.added += 1;
            }
            add_locked(&mut **map, bookmark, now)?;
        }

        tracing::info!(
            added = summary.added,
            updated = summary.updated,
            "imported bookmarks"
        );
        Ok(summary)
    }

    /// Snapshot of every stored bookmark, in backend order.
    pub fn all(&self) -> Result<Vec<Bookmark>> {
        let map = self.lock()?;
        map.values()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BookmarkMap>> {
        self.map
            .lock()
            .map_err(|_| anyhow!("bookmark store lock poisoned"))
    }

    /// Backfill missing creation/modification timestamps on records
    /// written by older versions. Failures are logged, never raised.
    fn migrate_structure(&self) {
        let mut map = match self.lock() {
            Ok(map) => map,
            Err(err) => {
                tracing::error!(error = %err, "unable to migrate bookmark structure");
                return;
            }
        };

        let records = match map.values() {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(error = %err, "unable to read bookmarks for migration");
                return;
            }
        };

        let mut migrated = 0usize;
        let mut failed = 0usize;
        for record in records {
            if record.created.is_some() && record.modified.is_some() {
                continue;
            }

            let now = (self.clock)();
            let mut updated = record.clone();
            updated.created.get_or_insert(now);
            updated.modified.get_or_insert(now);

            match add_locked(&mut **map, updated, now) {
                Ok(_) => {
                    migrated += 1;
                    tracing::debug!(url = %record.url, "backfilled bookmark timestamps");
                }
                Err(err) => {
                    failed += 1;
                    tracing::error!(
                        url = %record.url,
                        error = %format!("{err:#}"),
                        "unable to update bookmark structure"
                    );
                }
            }
        }

        if migrated > 0 || failed > 0 {
            tracing::info!(migrated, failed, "bookmark structure migration finished");
        }
    }
}

fn add_locked(
    map: &mut (dyn DurableMap<Locator, Bookmark> + Send),
    bookmark: Bookmark,
    now: OffsetDateTime,
) -> Result<Bookmark> {
    let mut result = bookmark;

    // An explicit creation timestamp (e.g. from an import) wins.
    if result.created.is_none() {
        let original = map.get(&result.url)?;
        result.created = Some(original.and_then(|o| o.created).unwrap_or(now));
    }

    if result.modified.is_none() {
        result.modified = Some(now);
    }

    map.add(result.clone())?;
    Ok(result)
}
