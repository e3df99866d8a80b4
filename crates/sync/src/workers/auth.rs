use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use expense_core::UserIdentity;

use crate::auth::AuthSession;

/// Forwards every identity change to [`AuthSession::handle_auth_change`].
pub struct AuthWorker {
    session: Arc<AuthSession>,
    identities: watch::Receiver<Option<UserIdentity>>,
}

impl AuthWorker {
    pub fn new(session: Arc<AuthSession>, identities: watch::Receiver<Option<UserIdentity>>) -> Self {
        Self {
            session,
            identities,
        }
    }

    /// Apply the current identity, then every change until the provider is
    /// dropped.
    pub async fn run(mut self) {
        info!("AuthWorker started");

        loop {
            let identity = self.identities.borrow_and_update().clone();
            let transition = self.session.handle_auth_change(identity).await;
            debug!(?transition, "auth change handled");

            if self.identities.changed().await.is_err() {
                break;
            }
        }

        info!("AuthWorker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;
    use std::time::Duration;

    use expense_core::Ledger;

    use crate::auth::{AuthProvider, LocalAuthProvider};
    use crate::bridge::SyncBridge;
    use crate::controller::StorageController;
    use crate::events::EventBus;
    use crate::local::{InMemoryKeyValueStore, LocalPersistence};
    use crate::remote::{InMemoryDocumentStore, RemoteStoreAdapter};

    #[tokio::test]
    async fn test_worker_follows_provider() {
        let adapter = Arc::new(RemoteStoreAdapter::new(Arc::new(
            InMemoryDocumentStore::new(),
        )));
        let events = EventBus::new();
        let controller = Arc::new(StorageController::open(
            LocalPersistence::new(
                Arc::new(InMemoryKeyValueStore::new()),
                Arc::new(InMemoryKeyValueStore::new()),
            ),
            Arc::clone(&adapter),
            events.clone(),
        ));
        let bridge = SyncBridge::new(adapter, Arc::new(RwLock::new(Ledger::new())), events);
        let session = Arc::new(AuthSession::new(Arc::clone(&controller), bridge));

        let provider = LocalAuthProvider::new(Some(UserIdentity::new("u1")));
        let worker = AuthWorker::new(session, provider.subscribe());
        let handle = tokio::spawn(worker.run());

        provider.sign_in().await.unwrap();
        for _ in 0..50 {
            if controller.current_user().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(controller.current_user().map(|u| u.id).as_deref(), Some("u1"));

        drop(provider);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
