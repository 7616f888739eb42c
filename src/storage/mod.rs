//! Durable local storage.
//!
//! A synchronous string-keyed key/value store scoped to one installation,
//! playing the role a browser's `localStorage` plays for a web client.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Storage persisted as one JSON object on disk.
///
/// Every mutation rewrites the whole file through a temp file and a rename,
/// so readers see either the old or the new contents. A missing file reads
/// as empty. A corrupt file fails reads, and the next write moves it aside
/// to `<path>.corrupt` and starts over empty.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// Entries to build a write on, and whether a corrupt file was set
    /// aside to get them. The corrupt file is kept as a backup and treated
    /// as empty so persistence keeps working.
    fn read_for_write(&self) -> Result<(BTreeMap<String, String>, bool), StorageError> {
        match self.read_all() {
            Ok(entries) => Ok((entries, false)),
            Err(StorageError::Corrupt(reason)) => {
                let backup = self.backup_path();
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    %reason,
                    "Storage file is corrupt, starting over"
                );
                if let Err(e) = std::fs::rename(&self.path, &backup) {
                    warn!(error = %e, "Failed to back up corrupt storage file");
                }
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            serde_json::to_string_pretty(entries).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            std::fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut entries, _) = self.read_for_write()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut entries, recovered) = self.read_for_write()?;
        if entries.remove(key).is_some() || recovered {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("folio-storage-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn memory_storage_get_set_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("a").unwrap(), None);

        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));

        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let path = temp_path();

        let storage = FileStorage::new(&path);
        storage.set("authSettings", "{\"x\":1}").unwrap();
        drop(storage);

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get("authSettings").unwrap().as_deref(),
            Some("{\"x\":1}")
        );

        reopened.remove("authSettings").unwrap();
        assert_eq!(reopened.get("authSettings").unwrap(), None);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let storage = FileStorage::new(temp_path());
        assert_eq!(storage.get("anything").unwrap(), None);
        storage.remove("anything").unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn file_storage_reports_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get("k"), Err(StorageError::Corrupt(_))));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn file_storage_recovers_from_truncated_file() {
        let path = temp_path();
        std::fs::write(&path, r#"{"authSettings": "{\"enableReg"#).unwrap();

        let storage = FileStorage::new(&path);
        storage.set("authSettings", "{}").unwrap();
        assert_eq!(storage.get("authSettings").unwrap().as_deref(), Some("{}"));

        let backup = storage.backup_path();
        assert!(backup.exists());
        assert!(
            std::fs::read_to_string(&backup)
                .unwrap()
                .starts_with(r#"{"authSettings""#)
        );

        std::fs::remove_file(&path).ok();
        std::fs::remove_file(&backup).ok();
    }

    #[test]
    fn file_storage_remove_clears_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        storage.remove("folio-session").unwrap();
        assert_eq!(storage.get("folio-session").unwrap(), None);

        std::fs::remove_file(&path).ok();
        std::fs::remove_file(storage.backup_path()).ok();
    }

    #[test]
    fn file_storage_leaves_no_temp_files() {
        let dir = std::env::temp_dir().join(format!("folio-dir-{}", uuid::Uuid::new_v4()));
        let storage = FileStorage::new(dir.join("storage.json"));
        storage.set("a", "1").unwrap();
        storage.set("b", "2").unwrap();

        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["storage.json"]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
