//! Durable key-value storage for named JSON values.
//!
//! The bookmark store and the reading position tracker share one store but
//! own disjoint keys, so every write is independent and last-write-wins.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::PersistenceError;

pub const BOOKMARKS_KEY: &str = "bookmarks";
pub const LAST_READ_KEY: &str = "lastRead";

pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    /// Replaces the value under `key`.
    fn write(&self, key: &str, value: &Value) -> Result<(), PersistenceError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Outcome of a store mutation.
///
/// The in-memory value is authoritative for the running session whether or
/// not the durable write succeeded; `error` marks the mutation as not durable.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Persisted<T> {
    pub value: T,
    pub error: Option<PersistenceError>,
}

impl<T> Persisted<T> {
    pub fn new(value: T, durable: Result<(), PersistenceError>) -> Self {
        Self {
            value,
            error: durable.err(),
        }
    }

    pub fn durable(value: T) -> Self {
        Self { value, error: None }
    }

    pub fn is_durable(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, PersistenceError> {
        match self.error {
            None => Ok(self.value),
            Some(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Persisted<U> {
        Persisted {
            value: f(self.value),
            error: self.error,
        }
    }
}

pub(crate) fn read_typed<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match store.read(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|err| PersistenceError::Decode {
                key: key.to_string(),
                reason: err.to_string(),
            }),
    }
}

pub(crate) fn write_typed<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let value = serde_json::to_value(value).map_err(|err| PersistenceError::Encode {
        key: key.to_string(),
        reason: err.to_string(),
    })?;
    store.write(key, &value)
}

/// Process-local store; the durable copy lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let values = self.values.lock().map_err(|_| PersistenceError::Read {
            key: key.to_string(),
            reason: "store lock poisoned".to_string(),
        })?;
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        let mut values = self.values.lock().map_err(|_| PersistenceError::Write {
            key: key.to_string(),
            reason: "store lock poisoned".to_string(),
        })?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// One `<key>.json` file per key under a root directory.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never observes a partial value.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| PersistenceError::Write {
            key: root.display().to_string(),
            reason: format!("creating store directory: {err}"),
        })?;
        debug!(root = %root.display(), "Opened JSON file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.path_for(key)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                warn!(path = %path.display(), "Failed to read stored value: {err}");
                return Err(PersistenceError::Read {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
            }
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|err| PersistenceError::Decode {
                key: key.to_string(),
                reason: err.to_string(),
            })
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let contents =
            serde_json::to_string_pretty(value).map_err(|err| PersistenceError::Encode {
                key: key.to_string(),
                reason: err.to_string(),
            })?;
        let tmp = path.with_extension("json.tmp");
        let write_err = |err: std::io::Error| PersistenceError::Write {
            key: key.to_string(),
            reason: err.to_string(),
        };
        fs::write(&tmp, contents).map_err(write_err)?;
        fs::rename(&tmp, &path).map_err(write_err)?;
        debug!(key, path = %path.display(), "Persisted value");
        Ok(())
    }
}
