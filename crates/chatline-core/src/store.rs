//! Key-value persistence for the transcript and saved set.
//!
//! The adapter is pure get/set over string values; the typed
//! [`SessionStore`] wrapper owns JSON encoding and decode fallbacks.

use crate::error::StoreError;
use crate::saved::SavedSet;
use chatline_config::StorageConfig;
use chatline_protocol::Message;
use directories::ProjectDirs;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Durable string store keyed by name.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// File-backed store writing one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized file store (root={})", root.display());
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)?;
        debug!("read key (key={}, len={})", key, value.len());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        let temp_path = self.root.join(format!("{key}.json.tmp"));
        let written =
            write_file(&temp_path, value.as_bytes()).and_then(|()| fs::rename(&temp_path, &path));
        if let Err(err) = written {
            warn!("failed to write key (key={}, err={})", key, err);
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(
                    "temp file not removed (path={}, err={})",
                    temp_path.display(),
                    cleanup
                );
            }
            return Err(err.into());
        }
        debug!("wrote key (key={}, len={})", key, value.len());
        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.write_all(contents)?;
    file.flush()
}

/// In-memory store used when persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Default storage directory under the platform data dir.
pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    ProjectDirs::from("", "", "chatline")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(StoreError::NoDataDir)
}

/// Build the key-value store described by the storage config.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    if !config.enabled {
        info!("persistence disabled; using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let root = match &config.path {
        Some(path) => PathBuf::from(path),
        None => default_data_dir()?,
    };
    Ok(Arc::new(FileStore::new(root)?))
}

/// Typed access to the two persisted session keys.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    history_key: String,
    saved_key: String,
}

impl SessionStore {
    /// Wrap a store using the configured key names.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &StorageConfig) -> Self {
        Self::with_keys(store, &config.history_key, &config.saved_key)
    }

    /// Wrap a store using explicit key names.
    pub fn with_keys(
        store: Arc<dyn KeyValueStore>,
        history_key: impl Into<String>,
        saved_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            history_key: history_key.into(),
            saved_key: saved_key.into(),
        }
    }

    pub fn history_key(&self) -> &str {
        &self.history_key
    }

    pub fn saved_key(&self) -> &str {
        &self.saved_key
    }

    /// Load the persisted transcript.
    ///
    /// Returns `None` when nothing is stored or the value does not decode,
    /// so the caller can fall back to its greeting.
    pub fn load_transcript(&self) -> Option<Vec<Message>> {
        let raw = match self.store.get(&self.history_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(
                    "failed to read transcript (key={}, err={})",
                    self.history_key, err
                );
                return None;
            }
        };
        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                debug!("hydrated transcript (messages={})", messages.len());
                Some(messages)
            }
            Err(err) => {
                warn!(
                    "stored transcript is undecodable (key={}, err={})",
                    self.history_key, err
                );
                None
            }
        }
    }

    /// Load the persisted saved set, empty when absent or undecodable.
    pub fn load_saved(&self) -> SavedSet {
        let raw = match self.store.get(&self.saved_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SavedSet::default(),
            Err(err) => {
                warn!(
                    "failed to read saved set (key={}, err={})",
                    self.saved_key, err
                );
                return SavedSet::default();
            }
        };
        serde_json::from_str::<SavedSet>(&raw).unwrap_or_else(|err| {
            warn!(
                "stored saved set is undecodable (key={}, err={})",
                self.saved_key, err
            );
            SavedSet::default()
        })
    }

    /// Serialize and overwrite the persisted transcript.
    pub fn save_transcript(&self, messages: &[Message]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(messages)?;
        self.store.set(&self.history_key, &raw)
    }

    /// Serialize and overwrite the persisted saved set.
    pub fn save_saved(&self, saved: &SavedSet) -> Result<(), StoreError> {
        let raw = serde_json::to_string(saved)?;
        self.store.set(&self.saved_key, &raw)
    }
}
