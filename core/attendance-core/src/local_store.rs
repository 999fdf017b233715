//! Durable key-value storage for client-side state.
//!
//! The pending-action queue, last-known session statuses and day records are
//! persisted here so they survive process restarts.
//!
//! # File Format
//!
//! Each key holds one versioned JSON document:
//!
//! ```json
//! { "version": 1, "data": { ... } }
//! ```
//!
//! # Defensive Design
//!
//! Documents are loaded leniently: empty files, corrupt JSON and unsupported
//! versions all load as the default value with a warning. Writes go through a
//! temp file + rename so a crash never leaves a half-written document.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::{CoreError, Result};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store key: {0:?}")]
    InvalidKey(String),
}

/// Client-resident persistent storage.
///
/// Implementations must make `save` durable before returning.
pub trait LocalStore: Send + Sync {
    fn load(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, LocalStoreError>;

    fn save(&self, key: &str, bytes: &[u8]) -> std::result::Result<(), LocalStoreError>;

    fn delete(&self, key: &str) -> std::result::Result<(), LocalStoreError>;
}

fn validate_key(key: &str) -> std::result::Result<(), LocalStoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LocalStoreError::InvalidKey(key.to_string()))
    }
}

fn io_error(context: String, source: std::io::Error) -> LocalStoreError {
    LocalStoreError::Io { context, source }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File-backed store
// ═══════════════════════════════════════════════════════════════════════════════

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: &Path) -> Self {
        FileStore {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> std::result::Result<PathBuf, LocalStoreError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl LocalStore for FileStore {
    fn load(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, LocalStoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(format!("read {}", key), err)),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> std::result::Result<(), LocalStoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)
            .map_err(|err| io_error("create store directory".to_string(), err))?;

        let mut temp_file = NamedTempFile::new_in(&self.root)
            .map_err(|err| io_error(format!("create temp file for {}", key), err))?;
        temp_file
            .write_all(bytes)
            .map_err(|err| io_error(format!("write {}", key), err))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|err| io_error(format!("sync {}", key), err))?;
        temp_file
            .persist(&path)
            .map_err(|err| io_error(format!("persist {}", key), err.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> std::result::Result<(), LocalStoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(format!("delete {}", key), err)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════════════

/// Volatile store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn load(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, LocalStoreError> {
        validate_key(key)?;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> std::result::Result<(), LocalStoreError> {
        validate_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> std::result::Result<(), LocalStoreError> {
        validate_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Versioned documents
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct DocumentRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Document<T> {
    version: u32,
    data: T,
}

/// Loads a versioned document, falling back to `T::default()` when the key is
/// missing, empty, corrupt or written by an unsupported version.
pub fn load_document<T>(store: &dyn LocalStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match store.load(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!(key, error = %err, "Failed to read local document; starting empty");
            return T::default();
        }
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return T::default();
    }

    match serde_json::from_slice::<Document<T>>(&bytes) {
        Ok(doc) if doc.version == DOCUMENT_VERSION => doc.data,
        Ok(doc) => {
            warn!(
                key,
                version = doc.version,
                expected = DOCUMENT_VERSION,
                "Unsupported local document version; starting empty"
            );
            T::default()
        }
        Err(err) => {
            warn!(key, error = %err, "Corrupt local document; starting empty");
            T::default()
        }
    }
}

pub fn save_document<T: Serialize>(store: &dyn LocalStore, key: &str, data: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&DocumentRef {
        version: DOCUMENT_VERSION,
        data,
    })
    .map_err(|source| CoreError::Json {
        context: format!("serialize {}", key),
        source,
    })?;
    store.save(key, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_round_trip() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(&temp.path().join("data"));

        store.save("queue", b"hello").unwrap();
        assert_eq!(store.load("queue").unwrap(), Some(b"hello".to_vec()));
        assert!(temp.path().join("data").join("queue.json").exists());
    }

    #[test]
    fn test_file_store_missing_key_is_none() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path());
        assert_eq!(store.load("nothing").unwrap(), None);
    }

    #[test]
    fn test_file_store_delete_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path());
        store.save("k", b"v").unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }

    #[test]
    fn test_keys_cannot_escape_root() {
        let temp = tempdir().unwrap();
        let store = FileStore::new(temp.path());
        assert!(matches!(
            store.save("../escape", b"x"),
            Err(LocalStoreError::InvalidKey(_))
        ));
        assert!(store.load("").is_err());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.save("k", b"v").unwrap();
        assert_eq!(store.load("k").unwrap(), Some(b"v".to_vec()));
        store.delete("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }

    #[test]
    fn test_document_round_trip() {
        let store = MemoryStore::new();
        let data = vec!["a".to_string(), "b".to_string()];
        save_document(&store, "list", &data).unwrap();
        let loaded: Vec<String> = load_document(&store, "list");
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_corrupt_document_loads_default() {
        let store = MemoryStore::new();
        store.save("list", b"{broken").unwrap();
        let loaded: Vec<String> = load_document(&store, "list");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_unsupported_version_loads_default() {
        let store = MemoryStore::new();
        store
            .save("list", br#"{"version":99,"data":["x"]}"#)
            .unwrap();
        let loaded: Vec<String> = load_document(&store, "list");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_empty_document_loads_default() {
        let store = MemoryStore::new();
        store.save("list", b"  \n").unwrap();
        let loaded: Vec<String> = load_document(&store, "list");
        assert!(loaded.is_empty());
    }
}
