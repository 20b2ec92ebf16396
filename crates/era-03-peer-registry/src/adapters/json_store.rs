//! # Added-Node Stores
//!
//! `JsonFileStore` keeps the list as a JSON array of strings. Writes go to a
//! temporary sibling and are renamed into place; a sidecar lock file taken
//! with `fs2` serializes processes sharing a data directory.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::ports::{AddedNodeStore, StoreError};

/// File name inside the data directory.
pub const ADDED_NODES_FILE: &str = "addednodes.json";

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/addednodes.json`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(ADDED_NODES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn open_lock(&self) -> Result<File, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?)
    }
}

impl AddedNodeStore for JsonFileStore {
    /// A missing file is an empty list.
    fn load(&self) -> Result<Vec<String>, StoreError> {
        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let result = match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::from),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::from(e)),
        };
        lock.unlock()?;
        result
    }

    fn save(&self, nodes: &[String]) -> Result<(), StoreError> {
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let tmp = self.path.with_extension("json.tmp");
        let result = (|| -> Result<(), StoreError> {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, nodes)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }

        lock.unlock()?;
        result
    }
}

/// In-memory store for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Mutex<Vec<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: Vec<String>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            saves: Mutex::new(0),
        }
    }

    pub fn nodes(&self) -> Vec<String> {
        self.nodes.lock().clone()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl AddedNodeStore for MemoryStore {
    fn load(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.nodes.lock().clone())
    }

    fn save(&self, nodes: &[String]) -> Result<(), StoreError> {
        *self.nodes.lock() = nodes.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_data_dir(dir.path());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_data_dir(&dir.path().join("testnet"));
        let nodes = vec!["10.0.0.1:13546".to_string(), "seed.example".to_string()];

        store.save(&nodes).unwrap();
        assert_eq!(store.load().unwrap(), nodes);
        assert!(!store.path().with_extension("json.tmp").exists());

        store.save(&nodes[1..]).unwrap();
        assert_eq!(store.load().unwrap(), vec!["seed.example".to_string()]);
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_data_dir(dir.path());
        fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Format(_))));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStore::with_nodes(vec!["a".into()]);
        assert_eq!(store.load().unwrap(), vec!["a".to_string()]);
        store.save(&[]).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.nodes().is_empty());
    }
}
