//! Last-good report storage for the console client.
//!
//! Entries never expire. The envelope `timestamp` is what tells the user how
//! old a cached report is.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::errors::ClientError;

pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, ClientError>;

    fn write(&self, key: &str, payload: &str) -> Result<(), ClientError>;

    fn remove(&self, key: &str) -> Result<(), ClientError>;

    fn clear(&self) -> Result<(), ClientError>;
}

/// One JSON file per key inside a cache directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys may carry user input (equipment ids), so anything outside
    /// `[A-Za-z0-9_-]` is replaced before it reaches the filesystem.
    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

impl CacheStore for FileCacheStore {
    fn read(&self, key: &str) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, payload: &str) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let staging = target.with_extension("json.tmp");
        fs::write(&staging, payload)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), ClientError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, ClientError> {
        self.entries
            .lock()
            .map_err(|_| ClientError::Cache("cache lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn write(&self, key: &str, payload: &str) -> Result<(), ClientError> {
        self.entries()?.insert(key.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        self.entries()?.clear();
        Ok(())
    }
}
