//! In-memory KeyValueStore, used as the session scope and in tests.

use std::collections::HashMap;
use std::sync::RwLock;

use super::error::{LocalStoreError, Result};
use super::traits::KeyValueStore;

/// In-memory implementation of KeyValueStore.
///
/// Contents vanish with the process, which is exactly the session-scope
/// lifetime.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LocalStoreError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LocalStoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LocalStoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LocalStoreError::LockPoisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort_unstable();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.get("budget_session").unwrap(), None);

        store.set("budget_session", "500").unwrap();
        assert_eq!(store.get("budget_session").unwrap().as_deref(), Some("500"));
        assert!(store.contains("budget_session"));

        store.remove("budget_session").unwrap();
        store.remove("budget_session").unwrap();
        assert!(!store.contains("budget_session"));
    }

    #[test]
    fn test_keys_sorted() {
        let store = InMemoryKeyValueStore::new();
        store.set("b", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
    }
}
