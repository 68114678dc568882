//! Persistent preference store backends
//!
//! A store is a flat map from key to string value. Booleans are stored as the
//! literal strings `"true"`/`"false"`, sequences as JSON arrays. Interpreting
//! values is the job of [`crate::Preferences`]; a store only moves strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by a preference store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Failed to read {0:?}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write {0:?}: {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to create {0:?}: {1}")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse {0:?}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Preference storage unavailable")]
    Unavailable,

    #[error("Failed to watch preferences: {0}")]
    Watch(String),
}

/// Raw string key-value storage that survives restarts
pub trait PreferenceStore {
    /// Stored value for `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`; visible to the next `get` once this returns
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`; removing an absent key is not an error
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Delete every key
    fn clear(&mut self) -> Result<(), StoreError>;

    /// All stored keys, sorted
    fn keys(&self) -> Vec<String>;

    /// Re-read backing storage after an external edit. Returns whether any
    /// value differs from what this store already held.
    fn reload(&mut self) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// In-process store, used by tests and as a fallback when no file is available
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `pairs`
    pub fn with_values<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            unavailable: false,
        }
    }

    /// Make every subsequent write fail, as a full or locked store would
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.values.clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// On-disk layout of the preferences file
#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    preferences: BTreeMap<String, String>,
}

/// Write-through store backed by a TOML file
///
/// The in-memory map is authoritative for reads. A failed disk write leaves
/// the new value readable for the rest of the process and reports the error.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; a malformed
    /// one is logged and treated as empty so reads never fail.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::read_file(&path) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("{}; starting with empty preferences", e);
                BTreeMap::new()
            }
        };
        log::debug!("Opened preference store {:?} ({} keys)", path, values.len());
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content =
            fs::read_to_string(path).map_err(|e| StoreError::Read(path.to_path_buf(), e))?;
        let file: PreferencesFile =
            toml::from_str(&content).map_err(|e| StoreError::Parse(path.to_path_buf(), e))?;
        Ok(file.preferences)
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::CreateDir(parent.to_path_buf(), e))?;
            }
        }
        let file = PreferencesFile {
            preferences: self.values.clone(),
        };
        let content = toml::to_string_pretty(&file)?;
        fs::write(&self.path, content).map_err(|e| StoreError::Write(self.path.clone(), e))
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.values.clear();
        self.persist()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn reload(&mut self) -> Result<bool, StoreError> {
        let values = Self::read_file(&self.path)?;
        if values == self.values {
            return Ok(false);
        }
        self.values = values;
        Ok(true)
    }
}
