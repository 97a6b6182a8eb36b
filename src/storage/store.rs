//! Key-value store seam and the stores shipped with the runtime.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("stored value is not valid: {0}")]
    Corrupt(String),
}

/// Persistent client-side store (cookie jar, local storage, ...).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value`; `max_age` of `None` means "as long as the store keeps it".
    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<(), StorageError> {
        (**self).set(key, value, max_age)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory store honouring max-age.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expiry of `key`, for inspection.
    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.lock().get(key).and_then(|e| e.expires_at)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut entries = self.entries.lock();
        let expired = entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at <= Utc::now())
            .unwrap_or(false);
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<(), StorageError> {
        let expires_at = max_age.map(|age| Utc::now() + age);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Primary store with a fallback, e.g. cookies backed by local storage.
///
/// Reads fall through on a miss or an error, writes go to both and succeed
/// when either does.
pub struct LayeredStore {
    primary: Box<dyn KeyValueStore>,
    secondary: Box<dyn KeyValueStore>,
}

impl LayeredStore {
    pub fn new(primary: Box<dyn KeyValueStore>, secondary: Box<dyn KeyValueStore>) -> Self {
        Self { primary, secondary }
    }
}

impl KeyValueStore for LayeredStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.primary.get(key) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => self.secondary.get(key),
            Err(primary_err) => match self.secondary.get(key) {
                Ok(value) => Ok(value),
                Err(_) => Err(primary_err),
            },
        }
    }

    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<(), StorageError> {
        let primary = self.primary.set(key, value, max_age);
        let secondary = self.secondary.set(key, value, max_age);
        primary.or(secondary)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let primary = self.primary.remove(key);
        let secondary = self.secondary.remove(key);
        primary.and(secondary)
    }
}
