//! Persistent key-value storage behind the session.
//!
//! The host application provides the actual persistence (browser local
//! storage, a keychain, a config file); the crate only depends on this
//! synchronous string-valued interface.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key under which the access token is persisted.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Key under which the UI locale preference is persisted.
pub const LOCALE_KEY: &str = "locale";

/// Synchronous string key-value store surviving process restarts.
///
/// Values are plain strings, absent when unset. Implementations must be
/// safe to share across tasks.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);

    /// Removes the value stored under `key`, if any.
    fn remove(&self, key: &str);
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Returns the persisted UI locale preference, if any.
#[must_use]
pub fn locale(store: &dyn KeyValueStore) -> Option<String> {
    store.get(LOCALE_KEY)
}

/// Persists the UI locale preference.
pub fn set_locale(store: &dyn KeyValueStore, tag: &str) {
    store.set(LOCALE_KEY, tag);
}
