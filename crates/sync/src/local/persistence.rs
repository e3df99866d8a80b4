//! Adapter over the session and durable scopes.
//!
//! Every failure below this boundary (lock poisoning, I/O, malformed JSON) is
//! logged and absorbed: reads yield `None` so callers substitute defaults, and
//! writes report `false`.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::traits::KeyValueStore;

/// Separator between a base key and its partition suffix.
pub const KEY_SEPARATOR: &str = "_";

/// Literal partition token used for data not owned by a signed-in user.
const SESSION_PARTITION: &str = "session";

/// Whose data a storage key refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    Session,
    User(String),
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Session => f.write_str(SESSION_PARTITION),
            Partition::User(id) => f.write_str(id),
        }
    }
}

/// Resolve `base` to `<base>_<partition>`.
pub fn storage_key(base: &str, partition: &Partition) -> String {
    format!("{base}{KEY_SEPARATOR}{partition}")
}

/// Local scope selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Cleared when the session ends
    Session,
    /// Survives restarts
    Durable,
}

/// JSON-encoding adapter over both local scopes.
#[derive(Clone)]
pub struct LocalPersistence {
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl LocalPersistence {
    pub fn new(session: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { session, durable }
    }

    fn scope(&self, scope: Scope) -> &dyn KeyValueStore {
        match scope {
            Scope::Session => self.session.as_ref(),
            Scope::Durable => self.durable.as_ref(),
        }
    }

    /// Raw string read; failures read as absent.
    pub fn read_raw(&self, scope: Scope, key: &str) -> Option<String> {
        match self.scope(scope).get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(?scope, key, error = %err, "local read failed");
                None
            }
        }
    }

    /// Raw string write. Returns whether the value was stored.
    pub fn write_raw(&self, scope: Scope, key: &str, value: &str) -> bool {
        match self.scope(scope).set(key, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(?scope, key, error = %err, "local write failed");
                false
            }
        }
    }

    /// Remove a key. Returns whether the removal succeeded.
    pub fn remove(&self, scope: Scope, key: &str) -> bool {
        match self.scope(scope).remove(key) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(?scope, key, error = %err, "local remove failed");
                false
            }
        }
    }

    /// Keys present in a scope; failures read as empty.
    pub fn keys(&self, scope: Scope) -> Vec<String> {
        self.scope(scope).keys().unwrap_or_else(|err| {
            tracing::warn!(?scope, error = %err, "listing local keys failed");
            Vec::new()
        })
    }

    /// Decode the JSON stored under `key`. Malformed values read as absent.
    pub fn read_json<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Option<T> {
        let raw = self.read_raw(scope, key)?;
        decode(key, &raw)
    }

    /// Encode `value` as JSON and store it. Returns whether it was stored.
    pub fn write_json<T: Serialize + ?Sized>(&self, scope: Scope, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.write_raw(scope, key, &json),
            Err(err) => {
                tracing::error!(key, error = %err, "failed to encode local value");
                false
            }
        }
    }

    /// Session-mode read: the session scope wins, the durable backup is the
    /// fallback. Only the first present value is considered, so a corrupt
    /// session copy yields `None` rather than an older backup.
    pub fn read_session_first<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self
            .read_raw(Scope::Session, key)
            .or_else(|| self.read_raw(Scope::Durable, key))?;
        decode(key, &raw)
    }

    /// Session-mode write: the session scope plus a durable backup copy.
    /// Returns whether at least one copy was stored.
    pub fn write_session_with_backup<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let session = self.write_json(Scope::Session, key, value);
        let backup = self.write_json(Scope::Durable, key, value);
        session || backup
    }

    /// Drop `key` from both scopes.
    pub fn remove_everywhere(&self, key: &str) {
        self.remove(Scope::Session, key);
        self.remove(Scope::Durable, key);
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring malformed local value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::InMemoryKeyValueStore;

    fn setup() -> LocalPersistence {
        LocalPersistence::new(
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(InMemoryKeyValueStore::new()),
        )
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(storage_key("expenses", &Partition::Session), "expenses_session");
        assert_eq!(
            storage_key("budget", &Partition::User("u-42".to_string())),
            "budget_u-42"
        );
    }

    #[test]
    fn test_session_write_keeps_durable_backup() {
        let local = setup();
        assert!(local.write_session_with_backup("budget_session", &250.0));

        assert_eq!(local.read_json::<f64>(Scope::Session, "budget_session"), Some(250.0));
        assert_eq!(local.read_json::<f64>(Scope::Durable, "budget_session"), Some(250.0));
    }

    #[test]
    fn test_session_first_falls_back_to_backup() {
        let local = setup();
        local.write_json(Scope::Durable, "budget_session", &80.0);
        assert_eq!(local.read_session_first::<f64>("budget_session"), Some(80.0));

        local.write_json(Scope::Session, "budget_session", &90.0);
        assert_eq!(local.read_session_first::<f64>("budget_session"), Some(90.0));
    }

    #[test]
    fn test_malformed_json_reads_as_absent() {
        let local = setup();
        local.write_raw(Scope::Session, "expenses_session", "{not json");
        local.write_json(Scope::Durable, "expenses_session", &Vec::<u32>::new());

        assert_eq!(local.read_session_first::<Vec<u32>>("expenses_session"), None);
        assert_eq!(local.read_json::<Vec<u32>>(Scope::Session, "expenses_session"), None);
    }

    #[test]
    fn test_remove_everywhere() {
        let local = setup();
        local.write_session_with_backup("expenses_session", &vec![1, 2]);
        local.remove_everywhere("expenses_session");

        assert!(local.read_raw(Scope::Session, "expenses_session").is_none());
        assert!(local.read_raw(Scope::Durable, "expenses_session").is_none());
    }
}
