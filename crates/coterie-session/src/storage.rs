//! Durable client-side storage hook.
//!
//! Coterie doesn't own persistence. Whatever keeps data across reloads
//! (browser local storage, a config file, a keyring) plugs in through the
//! [`Storage`] trait: a plain string key/value contract.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStorage`] — process-local, cloneable, good for tests
//! - [`FileStorage`] — a JSON object in one file on disk

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::SessionError;

/// A string key/value store that survives reloads.
///
/// `Send + 'static` because the session client that owns it runs inside
/// the driver task.
///
/// # Example
///
/// ```rust
/// use coterie_session::{MemoryStorage, Storage};
///
/// let storage = MemoryStorage::default();
/// storage.set("k", "v").unwrap();
/// assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
/// storage.remove("k").unwrap();
/// assert_eq!(storage.get("k").unwrap(), None);
/// ```
pub trait Storage: Send + 'static {
    /// Reads the value under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Deletes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-memory [`Storage`].
///
/// Clones share the same map, so a test can keep one handle and inspect
/// what the client persisted through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> T {
        // A panic while holding the lock cannot leave the map half-written.
        let mut guard =
            self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.with(|m| m.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.with(|m| m.insert(key.to_owned(), value.to_owned()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.with(|m| m.remove(key));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// [`Storage`] backed by a single JSON object file.
///
/// Every write rewrites the whole file. That is fine for the handful of
/// keys the client keeps.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Uses `path`, creating the file lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SessionError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|source| {
            SessionError::CorruptValue {
                key: self.path.display().to_string(),
                source,
            }
        })
    }

    fn store(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), SessionError> {
        let text = serde_json::to_string_pretty(entries).map_err(|source| {
            SessionError::CorruptValue {
                key: self.path.display().to_string(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.load()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.store(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}
