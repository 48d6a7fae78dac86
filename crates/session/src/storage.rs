//! Persisted-credential storage (scoped key-value).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use devora_auth::Credential;

/// Synchronous key-value store for the session credential.
///
/// Reads happen at startup, writes on login/logout. Callers treat every error
/// as "no persisted credential".
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Credential>, StorageError>;

    fn set(&self, key: &str, credential: &Credential) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("credential storage io error: {0}")]
    Io(String),
    #[error("credential storage is corrupt: {0}")]
    Corrupt(String),
    #[error("no platform data directory available")]
    NoDataDir,
    #[error("credential storage lock poisoned")]
    Poisoned,
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: Mutex<HashMap<String, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a credential, as if persisted by a previous run.
    pub fn with_entry(key: &str, credential: Credential) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), credential);
        }
        store
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<Credential>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, credential: &Credential) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), credential.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON file store (`{"<key>": "<token>"}`), one file per application.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `credentials.json` under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("credentials.json"))
    }

    /// `<platform data dir>/devora/credentials.json`.
    pub fn in_data_dir() -> Result<Self, StorageError> {
        let base = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(Self::in_dir(base.join("devora")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, Credential>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn write_all(&self, entries: &HashMap<String, Credential>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let body =
            serde_json::to_string_pretty(entries).map_err(|e| StorageError::Io(e.to_string()))?;

        // Write-then-rename: readers never observe a partial file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| StorageError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<Credential>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, credential: &Credential) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        // Corrupt contents are replaced.
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), credential.clone());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut entries, corrupt) = match self.read_all() {
            Ok(entries) => (entries, false),
            Err(StorageError::Corrupt(_)) => (HashMap::new(), true),
            Err(err) => return Err(err),
        };
        if entries.remove(key).is_none() && !corrupt {
            return Ok(());
        }
        self.write_all(&entries)
    }
}
