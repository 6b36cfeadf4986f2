//! Snapshot store implementations
//!
//! - `JsonFileStore` keeps the ledger snapshot as pretty-printed JSON in a
//!   data directory. Saves go to a temporary file that is then renamed over
//!   the previous snapshot, so a crash mid-write never leaves a torn file.
//! - `MemoryStore` keeps the last snapshot in memory, for tests and for
//!   runs without a data directory.

use crate::core::traits::SnapshotStore;
use crate::types::{LedgerSnapshot, WalletError};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILE_NAME: &str = "ledger.json";

/// JSON snapshot file in a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store writing `<data_dir>/ledger.json`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the directory cannot be created.
    pub fn new(data_dir: &Path) -> Result<Self, WalletError> {
        fs::create_dir_all(data_dir)?;
        Ok(JsonFileStore {
            path: data_dir.join(SNAPSHOT_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), WalletError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<LedgerSnapshot>, WalletError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        let snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }
}

/// In-memory snapshot store
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<LedgerSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved snapshot, if any
    pub fn last_saved(&self) -> Option<LedgerSnapshot> {
        self.snapshot.lock().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), WalletError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<LedgerSnapshot>, WalletError> {
        Ok(self.snapshot.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Account;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_snapshot() -> LedgerSnapshot {
        let account = Account::new(
            "USR_1_1".to_string(),
            "alice".to_string(),
            "hash".to_string(),
            Decimal::new(6_000_050, 2),
            1,
        );
        let mut index = BTreeMap::new();
        index.insert("alice".to_string(), "USR_1_1".to_string());
        LedgerSnapshot::new(vec![account], index, Vec::new(), Vec::new())
    }

    #[test]
    fn test_json_store_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_json_store_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(&dir.path().join("nested")).unwrap();
        let snapshot = sample_snapshot();

        store.save(&snapshot).unwrap();

        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_json_store_writes_versioned_schema_with_string_decimals() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.save(&sample_snapshot()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["usernameIndex"]["alice"], "USR_1_1");
        assert_eq!(value["accounts"][0]["bankBalance"], "60000.50");
    }

    #[test]
    fn test_json_store_corrupt_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        fs::write(store.path(), b"not json").unwrap();

        assert!(matches!(store.load(), Err(WalletError::Persistence { .. })));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&sample_snapshot()).unwrap();
        assert_eq!(store.last_saved(), Some(sample_snapshot()));
    }
}
