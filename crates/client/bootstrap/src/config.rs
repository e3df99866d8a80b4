//! Storage layer configuration structures and loaders.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use expense_core::UserIdentity;

/// Default period of the retry worker.
pub const DEFAULT_RETRY_SECS: u64 = 30;

/// Default capacity of each event bus topic.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Configuration required to assemble the storage layer.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Durable local store directory; platform data dir when unset
    pub data_dir: Option<PathBuf>,
    /// Shared document directory; an in-memory remote store when unset
    pub remote_dir: Option<PathBuf>,
    pub retry_interval: Duration,
    pub event_buffer: usize,
    /// Identity handed out by the local auth provider on sign-in
    pub identity: Option<UserIdentity>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            remote_dir: None,
            retry_interval: Duration::from_secs(DEFAULT_RETRY_SECS),
            event_buffer: DEFAULT_EVENT_BUFFER,
            identity: None,
        }
    }
}

impl SyncConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `EXPENSE_DATA_DIR` - Durable local store directory (default: platform-specific)
    /// - `EXPENSE_REMOTE_DIR` - Shared remote document directory (default: in-memory)
    /// - `EXPENSE_RETRY_SECS` - Seconds between queue drain attempts (default: 30)
    /// - `EXPENSE_EVENT_BUFFER` - Event bus capacity per topic (default: 100)
    /// - `EXPENSE_USER_ID` - Identity id; without it sign-in is unavailable
    /// - `EXPENSE_USER_NAME`, `EXPENSE_USER_EMAIL`, `EXPENSE_USER_PHOTO` - Display fields
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construct configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        config.data_dir = read("EXPENSE_DATA_DIR").map(PathBuf::from);
        config.remote_dir = read("EXPENSE_REMOTE_DIR").map(PathBuf::from);

        if let Some(secs) = read("EXPENSE_RETRY_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.retry_interval = Duration::from_secs(secs.max(1));
        }

        if let Some(capacity) = read("EXPENSE_EVENT_BUFFER").and_then(|v| v.parse::<usize>().ok()) {
            config.event_buffer = capacity.max(1);
        }

        config.identity = read("EXPENSE_USER_ID").map(|id| {
            let mut identity = UserIdentity::new(id);
            if let Some(name) = read("EXPENSE_USER_NAME") {
                identity = identity.with_display_name(name);
            }
            if let Some(email) = read("EXPENSE_USER_EMAIL") {
                identity = identity.with_email(email);
            }
            if let Some(photo) = read("EXPENSE_USER_PHOTO") {
                identity = identity.with_photo_url(photo);
            }
            identity
        });

        config
    }

    /// Durable local store directory, falling back to the platform default.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(crate::dirs::data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> SyncConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SyncConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.retry_interval, Duration::from_secs(30));
        assert_eq!(config.event_buffer, 100);
        assert!(config.identity.is_none());
        assert!(config.remote_dir.is_none());
    }

    #[test]
    fn test_values_are_clamped_and_parsed() {
        let config = config(&[
            ("EXPENSE_RETRY_SECS", "0"),
            ("EXPENSE_EVENT_BUFFER", "not-a-number"),
            ("EXPENSE_REMOTE_DIR", "/srv/expenses"),
        ]);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.event_buffer, 100);
        assert_eq!(config.remote_dir, Some(PathBuf::from("/srv/expenses")));
    }

    #[test]
    fn test_identity_from_env() {
        let config = config(&[
            ("EXPENSE_USER_ID", "demo-user-123"),
            ("EXPENSE_USER_NAME", "Demo User"),
            ("EXPENSE_USER_EMAIL", "  "),
        ]);
        let identity = config.identity.unwrap();
        assert_eq!(identity.id, "demo-user-123");
        assert_eq!(identity.display_name.as_deref(), Some("Demo User"));
        assert!(identity.email.is_none());
    }
}
