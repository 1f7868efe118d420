//! Typed value bound to one key of a [`KeyValueStore`].

use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{KeyValueStore, PersistenceError};

/// A cached value with read-through load and write-through save.
///
/// The value is loaded once at construction (or on [`rebind`](Self::rebind)).
/// A missing key, an unreadable medium, or a value that fails to parse all fall
/// back to the default.
pub struct Persisted<T> {
    medium: Arc<dyn KeyValueStore>,
    key: String,
    default: T,
    value: RwLock<T>,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(medium: Arc<dyn KeyValueStore>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = load(medium.as_ref(), &key, &default);
        Self {
            medium,
            key,
            default,
            value: RwLock::new(value),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        self.value.read().unwrap().clone()
    }

    /// Replace the value and persist it immediately.
    ///
    /// The cached value is updated even when the write fails, so the running
    /// client keeps the new value; only durability is lost. The cache lock is
    /// held across the write.
    pub fn set(&self, value: T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(&value)?;
        let mut cached = self.value.write().unwrap();
        *cached = value;
        self.medium.write(&self.key, &json)
    }

    /// Bind to a different key and reload from the medium.
    pub fn rebind(&mut self, key: impl Into<String>) {
        self.key = key.into();
        let value = load(self.medium.as_ref(), &self.key, &self.default);
        *self.value.write().unwrap() = value;
    }
}

fn load<T: DeserializeOwned + Clone>(medium: &dyn KeyValueStore, key: &str, default: &T) -> T {
    let raw = match medium.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return default.clone(),
        Err(e) => {
            log::warn!("Failed to read persisted value {}: {}", key, e);
            return default.clone();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Ignoring malformed persisted value {}: {}", key, e);
            default.clone()
        }
    }
}
