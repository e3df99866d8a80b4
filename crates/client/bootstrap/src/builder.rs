//! Builds the storage controller, auth session, and tracker used by front-ends.
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use expense_core::Ledger;
use expense_sync::{
    AuthProvider, AuthSession, AuthTransition, AuthWorker, DocumentStore, EventBus,
    FileDocumentStore, FileKeyValueStore, InMemoryDocumentStore, InMemoryKeyValueStore,
    KeyValueStore, LocalAuthProvider, LocalPersistence, RemoteStoreAdapter, RetryWorker,
    StorageController, SyncBridge, Tracker,
};

use crate::config::SyncConfig;

/// Builder that assembles local persistence, the remote adapter, and the
/// auth session for clients.
pub struct SyncBuilder {
    config: SyncConfig,
    remote_store: Option<Arc<dyn DocumentStore>>,
    durable_store: Option<Arc<dyn KeyValueStore>>,
}

impl SyncBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            remote_store: None,
            durable_store: None,
        }
    }

    /// Provide a custom remote document store instead of the configured one.
    pub fn remote_store(mut self, store: impl DocumentStore + 'static) -> Self {
        self.remote_store = Some(Arc::new(store));
        self
    }

    /// Provide a custom durable key-value store instead of the data directory.
    pub fn durable_store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.durable_store = Some(Arc::new(store));
        self
    }

    pub fn build(self) -> Result<SyncSetup> {
        let durable = match self.durable_store {
            Some(store) => store,
            None => {
                let dir = self.config.resolved_data_dir().join("local");
                let store = FileKeyValueStore::new(&dir)
                    .with_context(|| format!("failed to open local store at {}", dir.display()))?;
                Arc::new(store)
            }
        };
        // Session scope lives exactly as long as this process.
        let local = LocalPersistence::new(Arc::new(InMemoryKeyValueStore::new()), durable);

        let remote: Arc<dyn DocumentStore> = match (self.remote_store, &self.config.remote_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => {
                let store = FileDocumentStore::create(dir).with_context(|| {
                    format!("failed to open remote store at {}", dir.display())
                })?;
                Arc::new(store)
            }
            (None, None) => {
                tracing::warn!("no remote directory configured; using an in-memory remote store");
                Arc::new(InMemoryDocumentStore::new())
            }
        };

        let events = EventBus::with_capacity(self.config.event_buffer);
        let adapter = Arc::new(RemoteStoreAdapter::new(remote));
        let controller = Arc::new(StorageController::open(
            local.clone(),
            Arc::clone(&adapter),
            events.clone(),
        ));

        let ledger = Arc::new(RwLock::new(Ledger::new()));
        let bridge = SyncBridge::new(adapter, Arc::clone(&ledger), events.clone());
        let session = Arc::new(AuthSession::new(Arc::clone(&controller), bridge));
        let tracker = Tracker::new(Arc::clone(&controller), ledger);
        let provider = Arc::new(LocalAuthProvider::restore(
            self.config.identity.clone(),
            local,
        ));

        tracing::info!(
            mode = %controller.mode(),
            signed_in = provider.current().is_some(),
            "storage layer assembled"
        );

        Ok(SyncSetup {
            config: self.config,
            events,
            controller,
            session,
            tracker,
            provider,
        })
    }
}

pub struct SyncSetup {
    pub config: SyncConfig,
    pub events: EventBus,
    pub controller: Arc<StorageController>,
    pub session: Arc<AuthSession>,
    pub tracker: Tracker,
    pub provider: Arc<LocalAuthProvider>,
}

impl SyncSetup {
    /// Apply the provider's current identity and load the ledger.
    pub async fn start(&self) -> AuthTransition {
        let transition = self
            .session
            .handle_auth_change(self.provider.current())
            .await;
        self.tracker.reload().await;
        transition
    }

    /// Spawn the auth and retry workers onto the current runtime.
    pub fn spawn_workers(&self) -> WorkerHandles {
        let auth = tokio::spawn(
            AuthWorker::new(Arc::clone(&self.session), self.provider.subscribe()).run(),
        );
        let retry = tokio::spawn(
            RetryWorker::new(Arc::clone(&self.controller), self.config.retry_interval).run(),
        );
        WorkerHandles { auth, retry }
    }
}

/// Background tasks started by [`SyncSetup::spawn_workers`].
pub struct WorkerHandles {
    pub auth: JoinHandle<()>,
    pub retry: JoinHandle<()>,
}

impl WorkerHandles {
    pub fn abort(&self) {
        self.auth.abort();
        self.retry.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;
    use expense_core::{Category, ExpenseDraft, UserIdentity};
    use expense_sync::StorageMode;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> SyncConfig {
        SyncConfig {
            data_dir: Some(temp.path().join("data")),
            remote_dir: Some(temp.path().join("remote")),
            identity: Some(UserIdentity::new("builder-user")),
            ..SyncConfig::default()
        }
    }

    fn draft() -> ExpenseDraft {
        ExpenseDraft::new(
            "Groceries",
            42.0,
            Category::Food,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_build_starts_in_session_mode() {
        let temp = TempDir::new().unwrap();
        let setup = SyncBuilder::new(config(&temp)).build().unwrap();

        assert_eq!(setup.start().await, AuthTransition::Unchanged);
        assert_eq!(setup.controller.mode(), StorageMode::Session);
        assert!(setup.provider.current().is_none());
        assert!(temp.path().join("data").join("local").is_dir());
        assert!(temp.path().join("remote").is_dir());
    }

    #[tokio::test]
    async fn test_sign_in_survives_rebuild() {
        let temp = TempDir::new().unwrap();
        {
            let setup = SyncBuilder::new(config(&temp)).build().unwrap();
            setup.tracker.add_expense(draft()).await.unwrap();
            let user = setup.provider.sign_in().await.unwrap();
            setup.session.handle_auth_change(Some(user)).await;
            assert_eq!(setup.controller.mode(), StorageMode::Persistent);
        }

        let setup = SyncBuilder::new(config(&temp)).build().unwrap();
        assert!(matches!(
            setup.start().await,
            AuthTransition::SignedIn { migrated: None, .. }
        ));
        assert_eq!(setup.controller.mode(), StorageMode::Persistent);
        assert_eq!(setup.tracker.snapshot().expenses().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_stores_and_workers() {
        let remote = InMemoryDocumentStore::new();
        let setup = SyncBuilder::new(SyncConfig {
            retry_interval: Duration::from_millis(10),
            identity: Some(UserIdentity::new("worker-user")),
            ..SyncConfig::default()
        })
        .remote_store(remote.clone())
        .durable_store(InMemoryKeyValueStore::new())
        .build()
        .unwrap();

        let workers = setup.spawn_workers();
        setup.provider.sign_in().await.unwrap();
        for _ in 0..100 {
            if setup.controller.current_user().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        setup.controller.set_mode(StorageMode::Persistent);
        setup.tracker.set_budget(80.0).await.unwrap();
        assert_eq!(remote.document("worker-user").unwrap()["budget"], 80.0);

        workers.abort();
    }
}
