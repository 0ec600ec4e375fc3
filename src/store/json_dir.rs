//! Directory-of-JSON durable map.
//!
//! Every value lives in its own pretty-printed JSON document:
//!
//! - `<root>/<sha256(key)>.json`
//!
//! Hashing the key keeps file names short and filesystem-safe no
//! matter what characters a URL contains; the document itself carries
//! the full value, so the key is re-derived on load. Documents found
//! under any other `*.json` name (hand-copied or legacy files) are
//! still loaded; they are replaced by the canonical document the next
//! time their key is written or removed. All values are cached in
//! memory and writes go through a temp file plus rename.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::StoreBackendKind;
use crate::store::backend::{DurableMap, KeyFn};

/// File-backed implementation of `DurableMap`.
pub struct JsonDirMap<K, V> {
    root: PathBuf,
    key_of: KeyFn<K, V>,
    entries: BTreeMap<K, V>,
    strays: BTreeMap<K, Vec<PathBuf>>,
}

impl<K, V> JsonDirMap<K, V>
where
    K: Ord + Clone + AsRef<str>,
    V: Serialize + DeserializeOwned + Clone + PartialEq,
{
    /// Open (or create) a map rooted at the given directory and load
    /// every document found there.
    pub fn open(root: &Path, key_of: KeyFn<K, V>) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create store directory {}", root.display()))?;

        let mut entries = BTreeMap::new();
        let mut strays = BTreeMap::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || !is_document(&path) {
                continue;
            }

            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let value: V = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let key = key_of(&value);

            // A canonical document always wins over a stray copy of
            // the same key, regardless of directory order. Every stray
            // path is tracked so none survives a later write or remove.
            let canonical = path == canonical_path(root, &key);
            if !canonical {
                strays
                    .entry(key.clone())
                    .or_insert_with(Vec::new)
                    .push(path);
            }
            if canonical || !entries.contains_key(&key) {
                entries.insert(key, value);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            key_of,
            entries,
            strays,
        })
    }

    fn document_path(&self, key: &K) -> PathBuf {
        canonical_path(&self.root, key)
    }

    fn persist(&self, key: &K, value: &V) -> Result<()> {
        let path = self.document_path(key);
        let tmp_path = path.with_extension("json.tmp");

        let file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn delete(&self, key: &K) -> Result<()> {
        remove_if_present(&self.document_path(key))
    }

    fn delete_strays(&mut self, key: &K) -> Result<()> {
        let Some(paths) = self.strays.get_mut(key) else {
            return Ok(());
        };
        while let Some(path) = paths.last() {
            remove_if_present(path)?;
            paths.pop();
        }
        self.strays.remove(key);
        Ok(())
    }
}

impl<K, V> DurableMap<K, V> for JsonDirMap<K, V>
where
    K: Ord + Clone + AsRef<str>,
    V: Serialize + DeserializeOwned + Clone + PartialEq,
{
    fn kind(&self) -> StoreBackendKind {
        StoreBackendKind::File
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.entries.get(key).cloned())
    }

    fn add(&mut self, value: V) -> Result<()> {
        let key = (self.key_of)(&value);
        self.persist(&key, &value)?;
        self.delete_strays(&key)?;
        self.entries.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>> {
        if !self.entries.contains_key(key) {
            return Ok(None);
        }

        self.delete(key)?;
        self.delete_strays(key)?;
        Ok(self.entries.remove(key))
    }

    fn remove_by_value(&mut self, value: &V) -> Result<Option<V>> {
        let key = (self.key_of)(value);
        match self.entries.get(&key) {
            Some(stored) if stored == value => self.remove(&key),
            _ => Ok(None),
        }
    }

    fn values(&self) -> Result<Vec<V>> {
        Ok(self.entries.values().cloned().collect())
    }
}

fn canonical_path<K: AsRef<str>>(root: &Path, key: &K) -> PathBuf {
    root.join(format!("{}.json", document_stem(key.as_ref())))
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
    }
}

fn is_document(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
}

/// File stem used for a key: lower-case hex SHA-256 of its text.
pub(crate) fn document_stem(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
