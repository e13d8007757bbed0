// Storage module - persistent key-value store
//
// The host platform exposes a JSON key-value store; the core only needs
// get/set/remove over a handful of keys. Values are kept as serde_json
// values so each caller owns its own record shape.

mod file;
mod memory;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StorageError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Entries read from or written to a store in one call
pub type StoreEntries = BTreeMap<String, Value>;

/// Well-known store keys
pub mod keys {
    use chrono::NaiveDate;

    pub const BASELINE: &str = "baseline";
    pub const SENSITIVITY: &str = "sensitivity";
    pub const ENABLED: &str = "isEnabled";

    /// Daily statistics live under their ISO calendar date (`YYYY-MM-DD`)
    pub fn daily_stats(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }
}

/// Persistent key-value store
///
/// Implementations must be safe to share between the session and the
/// service loop. A failed `set` must leave previously stored values intact.
pub trait KeyValueStore: Send + Sync {
    /// Read the given keys; absent keys are simply missing from the result
    fn get(&self, keys: &[&str]) -> Result<StoreEntries, StorageError>;

    /// Write all entries at once
    fn set(&self, entries: StoreEntries) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a single key
///
/// # Returns
/// * `Ok(None)` - key is not present
/// * `Err(StorageError::Corrupt)` - value exists but does not decode as `T`
pub fn read_value<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let mut entries = store.get(&[key])?;
    match entries.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|err| StorageError::Corrupt {
                key: key.to_string(),
                reason: err.to_string(),
            }),
    }
}

/// Encode and write a single key
pub fn write_value<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let value = serde_json::to_value(value).map_err(|err| StorageError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    })?;
    let mut entries = StoreEntries::new();
    entries.insert(key.to_string(), value);
    store.set(entries)
}
