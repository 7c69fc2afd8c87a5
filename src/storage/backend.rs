//! Storage backend implementations.
//!
//! This module provides different storage backends:
//! - InMemoryStore: Fast, ephemeral storage for testing and genesis simulation
//! - FileStore: JSON file-based persistent storage
//! - CacheStore: Write-buffering overlay used to make a transaction atomic
//!
//! All backends iterate keys in byte order so that every replica observes
//! the same sequence of entries.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool>;

    /// List all keys with a given prefix, in ascending byte order
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush any pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Get all keys, in ascending byte order
    fn keys(&self) -> Result<Vec<StorageKey>>;

    /// Clear all data
    fn clear(&self) -> Result<()>;
}

fn lock_err<T>(e: PoisonError<T>) -> Error {
    Error::Internal(format!("Lock error: {}", e))
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend (for testing and ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get number of entries
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let data = self.data.read().map_err(lock_err)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write().map_err(lock_err)?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut data = self.data.write().map_err(lock_err)?;
        Ok(data.remove(key).is_some())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let data = self.data.read().map_err(lock_err)?;
        Ok(data.contains_key(key))
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let data = self.data.read().map_err(lock_err)?;
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<StorageKey>> {
        let data = self.data.read().map_err(lock_err)?;
        Ok(data.keys().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.data.write().map_err(lock_err)?;
        data.clear();
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-based storage backend using JSON with hex-encoded keys and values
#[derive(Debug)]
pub struct FileStore {
    base_path: PathBuf,
    cache: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Name of the data file inside the store directory
    pub const DATA_FILE: &'static str = "state.json";

    /// Open (or create) a file store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                Error::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let store = Self {
            base_path,
            cache: RwLock::new(BTreeMap::new()),
            dirty: RwLock::new(false),
        };

        store.load_from_disk()?;

        Ok(store)
    }

    fn data_file_path(&self) -> PathBuf {
        self.base_path.join(Self::DATA_FILE)
    }

    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();

        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path)
            .map_err(|e| Error::Storage(format!("Failed to open data file: {}", e)))?;

        let data: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Deserialization(format!("Failed to parse data file: {}", e)))?;

        let mut cache = self.cache.write().map_err(lock_err)?;

        for (key_hex, value_hex) in data {
            let key = hex::decode(&key_hex)
                .map_err(|e| Error::Deserialization(format!("Invalid key in storage: {}", e)))?;
            let value = hex::decode(&value_hex)
                .map_err(|e| Error::Deserialization(format!("Invalid value in storage: {}", e)))?;
            cache.insert(key, value);
        }

        tracing::debug!(path = %path.display(), entries = cache.len(), "Loaded file store");

        Ok(())
    }

    fn save_to_disk(&self) -> Result<()> {
        let cache = self.cache.read().map_err(lock_err)?;

        let data: BTreeMap<String, String> = cache
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        let path = self.data_file_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::Storage(format!("Failed to open data file for writing: {}", e)))?;

        serde_json::to_writer_pretty(BufWriter::new(file), &data)
            .map_err(|e| Error::Serialization(format!("Failed to write data file: {}", e)))?;

        *self.dirty.write().map_err(lock_err)? = false;

        Ok(())
    }

    fn mark_dirty(&self) -> Result<()> {
        *self.dirty.write().map_err(lock_err)? = true;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let cache = self.cache.read().map_err(lock_err)?;
        Ok(cache.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.cache
            .write()
            .map_err(lock_err)?
            .insert(key.to_vec(), value.to_vec());
        self.mark_dirty()
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = self.cache.write().map_err(lock_err)?.remove(key).is_some();
        if existed {
            self.mark_dirty()?;
        }
        Ok(existed)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let cache = self.cache.read().map_err(lock_err)?;
        Ok(cache.contains_key(key))
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let cache = self.cache.read().map_err(lock_err)?;
        Ok(cache
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn flush(&self) -> Result<()> {
        let dirty = *self.dirty.read().map_err(lock_err)?;
        if dirty {
            self.save_to_disk()?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<StorageKey>> {
        let cache = self.cache.read().map_err(lock_err)?;
        Ok(cache.keys().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        self.cache.write().map_err(lock_err)?.clear();
        self.mark_dirty()
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to flush file store on drop");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE STORE (TRANSACTION OVERLAY)
// ═══════════════════════════════════════════════════════════════════════════════

/// Buffers writes on top of a parent backend.
///
/// Reads fall through to the parent unless the key was written or deleted
/// in this overlay. Nothing reaches the parent until [`CacheStore::commit`]
/// is called; dropping the overlay discards every buffered write.
pub struct CacheStore<'a, B: StorageBackend + ?Sized> {
    parent: &'a B,
    /// `None` marks a deletion
    writes: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a, B: StorageBackend + ?Sized> CacheStore<'a, B> {
    /// Create an empty overlay on top of `parent`
    pub fn new(parent: &'a B) -> Self {
        Self {
            parent,
            writes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of buffered writes and deletions
    pub fn pending(&self) -> usize {
        self.writes.read().map(|w| w.len()).unwrap_or(0)
    }

    /// Write every buffered change through to the parent
    pub fn commit(self) -> Result<()> {
        let writes = self.writes.into_inner().map_err(lock_err)?;
        for (key, value) in writes {
            match value {
                Some(v) => self.parent.set(&key, &v)?,
                None => {
                    self.parent.delete(&key)?;
                }
            }
        }
        Ok(())
    }
}

impl<'a, B: StorageBackend + ?Sized> StorageBackend for CacheStore<'a, B> {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let writes = self.writes.read().map_err(lock_err)?;
        match writes.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes
            .write()
            .map_err(lock_err)?
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = self.exists(key)?;
        self.writes
            .write()
            .map_err(lock_err)?
            .insert(key.to_vec(), None);
        Ok(existed)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let writes = self.writes.read().map_err(lock_err)?;
        match writes.get(key) {
            Some(buffered) => Ok(buffered.is_some()),
            None => self.parent.exists(key),
        }
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let mut merged: BTreeMap<Vec<u8>, bool> = self
            .parent
            .list_prefix(prefix)?
            .into_iter()
            .map(|k| (k, true))
            .collect();

        let writes = self.writes.read().map_err(lock_err)?;
        for (key, value) in writes
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            merged.insert(key.clone(), value.is_some());
        }

        Ok(merged
            .into_iter()
            .filter_map(|(k, live)| live.then_some(k))
            .collect())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<StorageKey>> {
        self.list_prefix(&[])
    }

    fn clear(&self) -> Result<()> {
        let parent_keys = self.parent.keys()?;
        let mut writes = self.writes.write().map_err(lock_err)?;
        writes.clear();
        for key in parent_keys {
            writes.insert(key, None);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Type-safe wrapper around a storage backend, encoding values with bincode
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.backend.get(key)? {
            Some(data) => {
                let value = bincode::deserialize(&data).map_err(|e| {
                    Error::Deserialization(format!("Failed to deserialize value: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value)
            .map_err(|e| Error::Serialization(format!("Failed to serialize value: {}", e)))?;
        self.backend.set(key, &data)
    }

    /// Load every value stored under `prefix`, in key order
    pub fn values_with_prefix<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for key in self.backend.list_prefix(prefix)? {
            if let Some(value) = self.get(&key)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Get all keys
    pub fn keys(&self) -> Result<Vec<StorageKey>> {
        self.backend.keys()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Unwrap into the underlying backend
    pub fn into_backend(self) -> B {
        self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for the module's state
pub mod prefixes {
    /// Price feed by source id
    pub const FEED: &[u8] = b"feed/";
    /// Reserve asset class by class id
    pub const RESERVE: &[u8] = b"reserve/";
    /// Stablecoin record by denom
    pub const SUPPLY: &[u8] = b"supply/";
    /// Module parameters
    pub const PARAMS: &[u8] = b"params/";
    /// Peg controller state
    pub const CONTROLLER: &[u8] = b"controller/";
    /// Rebalance history by zero-padded sequence number
    pub const REBALANCE_HISTORY: &[u8] = b"rebalance_history/";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();

        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"nonexistent").unwrap(), None);

        assert!(store.exists(b"key1").unwrap());
        assert!(store.delete(b"key1").unwrap());
        assert!(!store.exists(b"key1").unwrap());
    }

    #[test]
    fn test_prefix_listing_is_ordered() {
        let store = InMemoryStore::new();

        store.set(b"feed/zeta", b"3").unwrap();
        store.set(b"feed/alpha", b"1").unwrap();
        store.set(b"feed/mid", b"2").unwrap();
        store.set(b"reserve/us_cash", b"x").unwrap();

        let keys = store.list_prefix(prefixes::FEED).unwrap();
        assert_eq!(
            keys,
            vec![b"feed/alpha".to_vec(), b"feed/mid".to_vec(), b"feed/zeta".to_vec()]
        );
        assert_eq!(store.list_prefix(prefixes::RESERVE).unwrap().len(), 1);
    }

    #[test]
    fn test_typed_store() {
        let store = TypedStore::new(InMemoryStore::new());

        store.set(b"number", &12345u64).unwrap();
        let value: u64 = store.get(b"number").unwrap().unwrap();
        assert_eq!(value, 12345);

        store.set(b"list/a", &"a".to_string()).unwrap();
        store.set(b"list/b", &"b".to_string()).unwrap();
        let values: Vec<String> = store.values_with_prefix(b"list/").unwrap();
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_make_key() {
        let key = make_key(prefixes::SUPPLY, b"ssusd");
        assert_eq!(key, b"supply/ssusd".to_vec());
    }

    #[test]
    fn test_cache_store_discard() {
        let parent = InMemoryStore::new();
        parent.set(b"a", b"1").unwrap();

        {
            let cache = CacheStore::new(&parent);
            cache.set(b"a", b"2").unwrap();
            cache.set(b"b", b"3").unwrap();
            assert_eq!(cache.get(b"a").unwrap(), Some(b"2".to_vec()));
            assert_eq!(cache.pending(), 2);
            // Dropped without commit
        }

        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(!parent.exists(b"b").unwrap());
    }

    #[test]
    fn test_cache_store_commit() {
        let parent = InMemoryStore::new();
        parent.set(b"k/1", b"1").unwrap();
        parent.set(b"k/2", b"2").unwrap();

        let cache = CacheStore::new(&parent);
        cache.delete(b"k/1").unwrap();
        cache.set(b"k/3", b"3").unwrap();

        assert_eq!(
            cache.list_prefix(b"k/").unwrap(),
            vec![b"k/2".to_vec(), b"k/3".to_vec()]
        );
        assert!(!cache.exists(b"k/1").unwrap());

        cache.commit().unwrap();

        assert!(!parent.exists(b"k/1").unwrap());
        assert_eq!(parent.get(b"k/3").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_cache_store_clear() {
        let parent = InMemoryStore::new();
        parent.set(b"x", b"1").unwrap();

        let cache = CacheStore::new(&parent);
        cache.clear().unwrap();
        assert!(cache.keys().unwrap().is_empty());
        assert!(parent.exists(b"x").unwrap());
    }

    #[test]
    fn test_file_store_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().to_path_buf();

        {
            let store = FileStore::new(&path).unwrap();
            store.set(b"supply/ssusd", b"data").unwrap();
            store.flush().unwrap();
        }

        assert!(path.join(FileStore::DATA_FILE).exists());

        {
            let store = FileStore::new(&path).unwrap();
            assert_eq!(store.get(b"supply/ssusd").unwrap(), Some(b"data".to_vec()));
        }
    }
}
