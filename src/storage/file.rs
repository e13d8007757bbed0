// JsonFileStore - key-value store backed by a single JSON document
//
// Every write rewrites the whole document into a sibling temp file and
// renames it over the original, so a crash mid-write never leaves a torn
// file behind. The document is re-read on every call; the store is small
// and other processes may edit it.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{KeyValueStore, StoreEntries};
use crate::error::StorageError;

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// The parent directory is created if needed; the file itself is only
    /// written on the first `set`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        log::debug!("[JsonFileStore] Opened store at {:?}", path);
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.write_lock.lock().map_err(|_| StorageError::Unavailable {
            reason: "file store lock poisoned".to_string(),
        })
    }

    fn read_document(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|err| StorageError::Corrupt {
            key: self.path.display().to_string(),
            reason: err.to_string(),
        })
    }

    fn write_document(&self, document: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, document).map_err(|err| {
                StorageError::Unavailable {
                    reason: err.to_string(),
                }
            })?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Result<StoreEntries, StorageError> {
        let _guard = self.lock()?;
        let mut document = self.read_document()?;
        Ok(keys
            .iter()
            .filter_map(|key| document.remove(*key).map(|value| (key.to_string(), value)))
            .collect())
    }

    fn set(&self, entries: StoreEntries) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        let mut document = self.read_document()?;
        document.extend(entries);
        self.write_document(&document)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        let mut document = self.read_document()?;
        if document.remove(key).is_some() {
            self.write_document(&document)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn entries(pairs: &[(&str, Value)]) -> StoreEntries {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("store.json")).unwrap();
        assert!(store.get(&["baseline"]).unwrap().is_empty());
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("store.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store
                .set(entries(&[("sensitivity", json!(3)), ("isEnabled", json!(true))]))
                .unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        let read = reopened.get(&["sensitivity", "isEnabled"]).unwrap();
        assert_eq!(read["sensitivity"], json!(3));
        assert_eq!(read["isEnabled"], json!(true));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_set_merges_and_remove_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("store.json")).unwrap();
        store.set(entries(&[("a", json!(1))])).unwrap();
        store.set(entries(&[("b", json!(2))])).unwrap();
        store.remove("a").unwrap();
        store.remove("never-there").unwrap();

        let read = store.get(&["a", "b"]).unwrap();
        assert!(!read.contains_key("a"));
        assert_eq!(read["b"], json!(2));
    }

    #[test]
    fn test_garbage_document_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(matches!(
            store.get(&["baseline"]),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
