//! Key/value media backing [`Persisted`](super::Persisted) values.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::PersistenceError;

/// A string-keyed store of JSON-serialized values.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw stored value for `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Stores each key as `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let temp_path = self.dir.join(format!("{key}.json.tmp"));

        fs::create_dir_all(&self.dir)?;
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }
}

/// Keys become file names, so they must be a single normal path component.
fn validate_key(key: &str) -> Result<(), PersistenceError> {
    if key.is_empty() {
        return Err(PersistenceError::InvalidKey(key.to_string()));
    }

    let mut components = Path::new(key).components();
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => Ok(()),
        _ => Err(PersistenceError::InvalidKey(key.to_string())),
    }
}

/// In-memory store. Clones share the same underlying map, which lets tests
/// simulate a restart by building a fresh reader over the same medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing serialization.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.insert_raw(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    mod file_store {
        use super::*;

        #[test]
        fn missing_key_reads_none() {
            let dir = tempdir().unwrap();
            let store = FileStore::new(dir.path());
            assert!(store.read("session_id").unwrap().is_none());
        }

        #[test]
        fn write_then_read() {
            let dir = tempdir().unwrap();
            let store = FileStore::new(dir.path());

            store.write("session_id", "\"sess-1\"").unwrap();

            assert_eq!(store.read("session_id").unwrap().as_deref(), Some("\"sess-1\""));
            assert!(dir.path().join("session_id.json").exists());
            assert!(!dir.path().join("session_id.json.tmp").exists());
        }

        #[test]
        fn write_creates_missing_directory() {
            let dir = tempdir().unwrap();
            let nested = dir.path().join("a").join("b");
            let store = FileStore::new(&nested);

            store.write("user_id", "null").unwrap();
            assert!(nested.join("user_id.json").exists());
        }

        #[test]
        fn rejects_path_traversal_keys() {
            let dir = tempdir().unwrap();
            let store = FileStore::new(dir.path());

            assert!(matches!(
                store.write("../escape", "1"),
                Err(PersistenceError::InvalidKey(_))
            ));
            assert!(matches!(
                store.read("a/b"),
                Err(PersistenceError::InvalidKey(_))
            ));
            assert!(matches!(store.read(""), Err(PersistenceError::InvalidKey(_))));
        }
    }

    mod memory_store {
        use super::*;

        #[test]
        fn clones_share_values() {
            let store = MemoryStore::new();
            let other = store.clone();

            store.write("k", "1").unwrap();
            assert_eq!(other.read("k").unwrap().as_deref(), Some("1"));
        }
    }
}
