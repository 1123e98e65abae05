//! Storage for unpacked level assets.
//!
//! The build step reads and writes raw asset bytes by key. [`MemoryStore`]
//! serves tests and in-process pipelines; [`DirStore`] maps each key to a file
//! under a root directory, the layout produced by the level unpacker.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Keyed byte storage shared between worker threads.
pub trait AssetStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Replace the bytes stored under `key`.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// The def/data pair of one terrain chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkKey(pub String);

impl ChunkKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn def_key(&self) -> String {
        format!("{}.def", self.0)
    }

    #[must_use]
    pub fn data_key(&self) -> String {
        format!("{}.data", self.0)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory store.
///
/// Writes replace whole entries, so a poisoned lock is recovered.
#[derive(Debug, Default)]
pub struct MemoryStore {
    assets: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let assets = self.assets.read().unwrap_or_else(PoisonError::into_inner);
        assets
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MissingAsset(key.to_string()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut assets = self.assets.write().unwrap_or_else(PoisonError::into_inner);
        assets.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// One file per key under a root directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl AssetStore for DirStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path(key);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::MissingAsset(key.to_string())
            } else {
                Error::io(path, e)
            }
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_keys() {
        let key = ChunkKey::new("terrain/chunk_03");
        assert_eq!(key.def_key(), "terrain/chunk_03.def");
        assert_eq!(key.data_key(), "terrain/chunk_03.data");
        assert_eq!(key.to_string(), "terrain/chunk_03");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(matches!(store.get("a"), Err(Error::MissingAsset(key)) if key == "a"));
        store.put("a", &[1, 2, 3]).unwrap();
        store.put("a", &[4]).unwrap();
        assert_eq!(store.get("a").unwrap(), vec![4]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_survives_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.put("a", &[1]).unwrap();
        let writer = std::sync::Arc::clone(&store);
        let panicked = std::thread::spawn(move || {
            let _guard = writer.assets.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());
        assert!(store.assets.is_poisoned());

        assert_eq!(store.get("a").unwrap(), vec![1]);
        store.put("b", &[2]).unwrap();
        assert_eq!(store.len(), 2);
    }
}
