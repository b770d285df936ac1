use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::Error;

/// Durable key-value storage for a remembered token.
///
/// Reads never fail; a missing or unreadable entry is `None`.
pub trait TokenStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the value could not be removed.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Process-local storage. Survives a [`SessionManager`](crate::SessionManager)
/// being rebuilt as long as the same instance is shared.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Storage backed by a small JSON object on disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        std::fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec(entries)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tutor-session-{}-{name}.json",
            std::process::id()
        ))
    }

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("authToken"), None);

        storage.set("authToken", "t1").unwrap();
        assert_eq!(storage.get("authToken").as_deref(), Some("t1"));

        storage.remove("authToken").unwrap();
        storage.remove("authToken").unwrap();
        assert_eq!(storage.get("authToken"), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);

        FileStorage::new(&path).set("authToken", "t1").unwrap();
        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("authToken").as_deref(), Some("t1"));

        reopened.remove("authToken").unwrap();
        assert_eq!(FileStorage::new(&path).get("authToken"), None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_file_storage_missing_file_reads_as_empty() {
        let storage = FileStorage::new(temp_path("missing"));
        assert_eq!(storage.get("authToken"), None);
        storage.remove("authToken").unwrap();
    }
}
