use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("store record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store file {path} is not a JSON object of strings")]
    Corrupt { path: PathBuf },
    #[error("store lock poisoned")]
    Poisoned,
}

/// String key-value persistence, scoped by the caller's key naming.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn KvStore>;

pub fn wallet_key(user_id: &str) -> String {
    format!("wallet:{user_id}")
}

pub fn favorites_key(user_id: &str) -> String {
    format!("favorites:{user_id}")
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Keeps every key in a single JSON object on disk. Writes go through a
/// sibling temp file and a rename so a crash never leaves a torn file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw).map_err(|_| StoreError::Corrupt {
            path: self.path.clone(),
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, encoded)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::Corrupt { path }) => {
                warn!(path = %path.display(), "replacing corrupt store file");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        apply(&mut entries);
        self.write_entries(&entries)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{favorites_key, wallet_key, FileStore, KvStore, MemoryStore, StoreError};

    #[test]
    fn keys_are_scoped_per_user() {
        assert_eq!(wallet_key("42"), "wallet:42");
        assert_eq!(favorites_key("42"), "favorites:42");
        assert_ne!(wallet_key("1"), wallet_key("2"));
    }

    #[test]
    fn memory_store_sets_gets_and_removes() {
        let store = MemoryStore::new();

        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v".to_owned()).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallets.json");

        let store = FileStore::open(&path).unwrap();
        store.set("wallet:1", "{\"cashUsd\":5}".to_owned()).unwrap();
        store.set("wallet:2", "{}".to_owned()).unwrap();
        store.remove("wallet:2").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("wallet:1").unwrap().as_deref(),
            Some("{\"cashUsd\":5}")
        );
        assert_eq!(reopened.get("wallet:2").unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn file_store_reports_corrupt_file_on_read_and_recovers_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        fs::write(&path, "[not json").unwrap();
        let store = FileStore::open(&path).unwrap();

        assert!(matches!(store.get("any"), Err(StoreError::Corrupt { .. })));

        store.set("wallet:1", "x".to_owned()).unwrap();
        assert_eq!(store.get("wallet:1").unwrap().as_deref(), Some("x"));
    }
}
