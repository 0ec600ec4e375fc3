//! SQLite-backed durable map.
//!
//! Values are stored as JSON text in a single table:
//!
//! - `entries(key TEXT PRIMARY KEY, value TEXT NOT NULL)`
//!
//! The connection is configured with:
//!
//! - `journal_mode = WAL` for concurrent readers and a single writer.
//! - `synchronous = NORMAL` as a balance between safety and speed.
//! - `busy_timeout` to avoid transient `database is locked` errors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::StoreBackendKind;
use crate::store::backend::{DurableMap, KeyFn};

/// SQLite-backed implementation of `DurableMap`.
pub struct SqliteMap<K, V> {
    path: PathBuf,
    conn: Connection,
    key_of: KeyFn<K, V>,
}

impl<K, V> SqliteMap<K, V>
where
    K: AsRef<str>,
    V: Serialize + DeserializeOwned + PartialEq,
{
    /// Open (or create) a SQLite map at the given database path.
    pub fn open(path: &Path, key_of: KeyFn<K, V>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("failed to open {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            conn,
            key_of,
        })
    }

    fn load(&self, key: &str) -> Result<Option<V>> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match text {
            Some(text) => {
                let value = serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse stored value for {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl<K, V> DurableMap<K, V> for SqliteMap<K, V>
where
    K: AsRef<str>,
    V: Serialize + DeserializeOwned + PartialEq,
{
    fn kind(&self) -> StoreBackendKind {
        StoreBackendKind::Sqlite
    }

    fn root(&self) -> &Path {
        &self.path
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        self.load(key.as_ref())
    }

    fn add(&mut self, value: V) -> Result<()> {
        let key = (self.key_of)(&value);
        let text = serde_json::to_string(&value)?;
        self.conn.execute(
            "INSERT INTO entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key.as_ref(), text],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let existing = self.load(key.as_ref())?;
        if existing.is_some() {
            self.delete(key.as_ref())?;
        }
        Ok(existing)
    }

    fn remove_by_value(&mut self, value: &V) -> Result<Option<V>> {
        let key = (self.key_of)(value);
        match self.load(key.as_ref())? {
            Some(stored) if &stored == value => {
                self.delete(key.as_ref())?;
                Ok(Some(stored))
            }
            _ => Ok(None),
        }
    }

    fn values(&self) -> Result<Vec<V>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM entries ORDER BY key ASC")?;

        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key, value))
        })?;

        let mut values = Vec::new();
        for row in rows {
            let (key, text) = row?;
            let value = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse stored value for {key}"))?;
            values.push(value);
        }

        Ok(values)
    }
}
