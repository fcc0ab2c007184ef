//! Local record store.
//!
//! A string-keyed map persisted as one JSON object on disk, patterned on the
//! browser `localStorage` the original site kept its records in. Components
//! above this one never touch the backing file directly.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::{fs, io};

use crate::error::Result;

/// Persistent key-value store shared by the registry and session manager.
///
/// Two instances opened on the same file do not synchronize: each mutation
/// rewrites the full map from this instance's view of it, so concurrent
/// writers race last-writer-wins, like browser tabs on one origin. This is
/// inherited behavior and deliberately not fixed with locking or versioning.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    map: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    /// Open the store backed by `path`, loading the map if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path: Some(path),
            map: Mutex::new(map),
        })
    }

    /// Volatile store without a backing file.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            map: Mutex::new(BTreeMap::new()),
        }
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Set `key` to `value` and rewrite the backing file.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut map = self.lock();
        map.insert(key.to_owned(), value.into());
        self.flush(&map)
    }

    /// Remove `key`. Safe to call when the key is absent.
    pub fn del(&self, key: &str) -> Result<()> {
        let mut map = self.lock();
        if map.remove(key).is_some() {
            self.flush(&map)?;
        }
        Ok(())
    }

    /// Remove every key. Irreversible.
    pub fn clear(&self) -> Result<()> {
        let mut map = self.lock();
        map.clear();
        self.flush(&map)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_string(map)?)?;
        }
        Ok(())
    }
}
