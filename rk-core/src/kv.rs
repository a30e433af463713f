//! Persistent key-value storage abstraction.
//!
//! The notification pipeline only ever needs two keys (the auth token and
//! the push registration record), so the seam is a flat string store. The
//! SQLite implementation lives in `rk-store`; `MemoryStore` backs tests and
//! throwaway sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{RkError, RkResult};

/// String key-value store shared across services.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> RkResult<Option<String>>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &str) -> RkResult<()>;

    /// Delete a value. Returns whether the key existed.
    fn remove(&self, key: &str) -> RkResult<bool>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with the given entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }

    fn lock(&self) -> RkResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| RkError::Internal("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> RkResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> RkResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> RkResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }
}
