//! Durable storage for the saved log
//!
//! [`PersistenceProvider`] is a minimal key/value interface: load bytes for a
//! key, save bytes under a key. [`FileStore`] keeps one JSON file per key in
//! the app data directory; [`MemoryStore`] keeps everything in memory and is
//! shared between clones, which lets tests simulate a process restart.

pub mod saved_log;

pub use saved_log::SavedLog;

use crate::config::ensure_dir;
use crate::error::{AgrolinkError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Key/value persistence
#[cfg_attr(test, mockall::automock)]
pub trait PersistenceProvider: Send {
    /// Bytes stored under `key`, or `None` if nothing was ever saved
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the bytes stored under `key`
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(AgrolinkError::Storage(format!(
                "Invalid storage key '{}'",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl PersistenceProvider for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(&path).map(Some).map_err(|e| {
            AgrolinkError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    /// Writes a sibling temp file and renames it over the target, so an
    /// interrupted write leaves the previous snapshot intact.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        ensure_dir(&self.dir)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| {
            AgrolinkError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            AgrolinkError::Storage(format!("Failed to replace {}: {}", path.display(), e))
        })
    }
}

/// In-memory store; clones share contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a key directly, bypassing any log logic
    pub fn insert_raw(&self, key: &str, bytes: &[u8]) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes.to_vec());
    }

    /// Raw bytes under a key
    pub fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl PersistenceProvider for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get_raw(key))
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.insert_raw(key, bytes);
        Ok(())
    }
}
