//! Contract for a local string key-value scope.

use super::error::Result;

/// A key → string store, the shape of browser-style local and session storage.
///
/// Implementations report failures; the [`LocalPersistence`] adapter decides
/// to absorb them.
///
/// [`LocalPersistence`]: super::LocalPersistence
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// List all stored keys in ascending order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Check if a key exists
    fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }
}
