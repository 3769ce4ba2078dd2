//! Persisted key/value storage seam.
//!
//! The host owns the physical storage (browser local storage, a desktop
//! settings file, ...). The core only reads and writes string entries through
//! [`KeyValueStore`]. Writes are idempotent and last-write-wins.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Process-wide string key/value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    inner: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
    }
}

/// Names of the persisted entries written by the core.
///
/// The theme key is listed so hosts share one naming scheme; the core never
/// reads or writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub tenant_id: String,
    pub theme: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access_token: "auth_token".to_string(),
            refresh_token: "refresh_token".to_string(),
            tenant_id: "tenant_id".to_string(),
            theme: "theme".to_string(),
        }
    }
}

impl StorageKeys {
    /// Default key names under a namespace (`"{prefix}.auth_token"`, ...).
    ///
    /// An empty prefix yields the default names.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Self::default();
        }
        let defaults = Self::default();
        let scoped = |name: &str| format!("{prefix}.{name}");
        Self {
            access_token: scoped(&defaults.access_token),
            refresh_token: scoped(&defaults.refresh_token),
            tenant_id: scoped(&defaults.tenant_id),
            theme: scoped(&defaults.theme),
        }
    }

    /// Keys purged when a session ends: both tokens and the tenant selection.
    pub fn session_keys(&self) -> [&str; 3] {
        [&self.access_token, &self.refresh_token, &self.tenant_id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = InMemoryKeyValueStore::new();
        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get("a").as_deref(), Some("2"));

        store.remove("a");
        store.remove("a");
        assert_eq!(store.get("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn prefixed_keys() {
        let keys = StorageKeys::with_prefix("dashsphere");
        assert_eq!(keys.access_token, "dashsphere.auth_token");
        assert_eq!(keys.tenant_id, "dashsphere.tenant_id");

        assert_eq!(StorageKeys::with_prefix("  "), StorageKeys::default());
    }

    #[test]
    fn session_keys_exclude_theme() {
        let keys = StorageKeys::default();
        assert!(!keys.session_keys().contains(&"theme"));
        assert_eq!(keys.session_keys().len(), 3);
    }
}
