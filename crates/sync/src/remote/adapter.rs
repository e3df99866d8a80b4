//! Thin wrapper over a [`DocumentStore`] that normalizes errors and owns the
//! single live change subscription.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::document::{DocumentPatch, UserDocument};
use super::traits::DocumentStore;
use crate::error::Result;

/// Callback invoked with the full current document on every remote mutation.
///
/// A deleted document is delivered as `Value::Null`.
pub type ChangeListener = Arc<dyn Fn(Value) + Send + Sync>;

struct Subscription {
    user_id: String,
    task: JoinHandle<()>,
}

/// Remote store adapter.
///
/// Stateless per call apart from the readiness latch and the live
/// subscription handle. It never queues or retries; that is the controller's
/// job.
pub struct RemoteStoreAdapter {
    store: Arc<dyn DocumentStore>,
    ready: OnceCell<()>,
    subscription: Mutex<Option<Subscription>>,
}

impl RemoteStoreAdapter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            ready: OnceCell::new(),
            subscription: Mutex::new(None),
        }
    }

    /// Await backend readiness. Succeeds at most once; a failed attempt is
    /// retried on the next call.
    pub async fn ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                self.store.ready().await?;
                tracing::debug!("remote store ready");
                Ok::<(), super::error::StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Merge `patch` into the user's document.
    #[tracing::instrument(skip(self, patch), fields(fields = patch.len()))]
    pub async fn save(&self, user_id: &str, patch: DocumentPatch) -> Result<()> {
        self.ready().await?;
        self.store.merge(user_id, patch.into_fields()).await?;
        tracing::debug!("remote document updated");
        Ok(())
    }

    /// Load the user's document. A missing document is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, user_id: &str) -> Result<UserDocument> {
        self.ready().await?;
        let document = match self.store.get(user_id).await? {
            Some(value) => UserDocument::from_value(&value),
            None => {
                tracing::debug!("no remote document yet");
                UserDocument::empty()
            }
        };
        Ok(document)
    }

    /// Remove the user's document entirely.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        self.ready().await?;
        self.store.delete(user_id).await?;
        tracing::info!("remote document deleted");
        Ok(())
    }

    /// Register `listener` for the user's document, replacing any existing
    /// subscription first.
    #[tracing::instrument(skip(self, listener))]
    pub async fn subscribe(&self, user_id: &str, listener: ChangeListener) -> Result<()> {
        self.unsubscribe();
        self.ready().await?;

        let mut rx = self.store.watch(user_id)?;
        let store = Arc::clone(&self.store);
        let owner = user_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(value) => listener(value),
                    Err(RecvError::Lagged(skipped)) => {
                        // Pushes were dropped; the current document supersedes them.
                        tracing::warn!(user_id = %owner, skipped, "change feed lagged, re-reading");
                        match store.get(&owner).await {
                            Ok(value) => listener(value.unwrap_or(Value::Null)),
                            Err(err) => {
                                tracing::warn!(user_id = %owner, error = %err, "re-read after lag failed")
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!(user_id = %owner, "change feed closed");
        });

        // A concurrent subscribe may have slipped in; only one may survive.
        if let Some(previous) = self.slot().replace(Subscription {
            user_id: user_id.to_string(),
            task,
        }) {
            previous.task.abort();
        }
        tracing::debug!("subscribed to remote changes");
        Ok(())
    }

    /// Tear down the live subscription. Returns whether one existed.
    pub fn unsubscribe(&self) -> bool {
        match self.slot().take() {
            Some(subscription) => {
                subscription.task.abort();
                tracing::debug!(user_id = %subscription.user_id, "unsubscribed from remote changes");
                true
            }
            None => false,
        }
    }

    /// User id of the live subscription, if any.
    pub fn subscribed_user(&self) -> Option<String> {
        self.slot().as_ref().map(|s| s.user_id.clone())
    }

    fn slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RemoteStoreAdapter {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{broadcast, mpsc};

    use crate::SyncError;
    use crate::remote::{
        DocumentFields, InMemoryDocumentStore, StoreError, StoreResult, EXPENSES_FIELD,
    };

    fn setup() -> (InMemoryDocumentStore, RemoteStoreAdapter) {
        let store = InMemoryDocumentStore::new();
        let adapter = RemoteStoreAdapter::new(Arc::new(store.clone()));
        (store, adapter)
    }

    fn channel_listener() -> (ChangeListener, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: ChangeListener = Arc::new(move |value| {
            let _ = tx.send(value);
        });
        (listener, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_document_loads_empty() {
        let (_store, adapter) = setup();
        let doc = adapter.load("nobody").await.unwrap();
        assert!(doc.expenses.is_empty());
        assert_eq!(doc.budget, 0.0);
    }

    #[tokio::test]
    async fn test_save_merges_fields() {
        let (store, adapter) = setup();
        adapter
            .save("u1", DocumentPatch::new().budget(500.0))
            .await
            .unwrap();
        adapter
            .save("u1", DocumentPatch::new().expenses(&[]).unwrap())
            .await
            .unwrap();

        let raw = store.document("u1").unwrap();
        assert_eq!(raw["budget"], 500.0);
        assert!(raw[EXPENSES_FIELD].is_array());
        assert!(raw["lastUpdated"].is_string());
        assert_eq!(adapter.load("u1").await.unwrap().budget, 500.0);
    }

    #[tokio::test]
    async fn test_errors_are_normalized() {
        let (store, adapter) = setup();
        store.go_offline();
        let err = adapter.load("u1").await.unwrap_err();
        assert!(err.is_transient());

        store.go_online();
        store.fail_next(StoreError::permission_denied("rules"));
        let err = adapter
            .save("u1", DocumentPatch::new().budget(1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_listener() {
        let (_store, adapter) = setup();
        let (first, mut first_rx) = channel_listener();
        let (second, mut second_rx) = channel_listener();

        adapter.subscribe("u1", first).await.unwrap();
        adapter.subscribe("u1", second).await.unwrap();
        assert_eq!(adapter.subscribed_user().as_deref(), Some("u1"));

        adapter
            .save("u1", DocumentPatch::new().budget(42.0))
            .await
            .unwrap();

        assert_eq!(next(&mut second_rx).await["budget"], 42.0);
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (store, adapter) = setup();
        let (listener, mut rx) = channel_listener();
        adapter.subscribe("u1", listener).await.unwrap();

        assert!(adapter.unsubscribe());
        assert!(!adapter.unsubscribe());
        assert!(adapter.subscribed_user().is_none());

        store.insert_document("u1", serde_json::json!({"budget": 3}));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_pushes_null() {
        let (store, adapter) = setup();
        store.insert_document("u1", serde_json::json!({"budget": 3}));
        let (listener, mut rx) = channel_listener();
        adapter.subscribe("u1", listener).await.unwrap();

        adapter.delete("u1").await.unwrap();
        assert_eq!(next(&mut rx).await, Value::Null);
        assert!(store.document("u1").is_none());
    }

    struct CountingStore {
        inner: InMemoryDocumentStore,
        ready_calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn ready(&self) -> StoreResult<()> {
            self.ready_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn merge(&self, user_id: &str, fields: DocumentFields) -> StoreResult<()> {
            self.inner.merge(user_id, fields).await
        }

        async fn get(&self, user_id: &str) -> StoreResult<Option<Value>> {
            self.inner.get(user_id).await
        }

        async fn delete(&self, user_id: &str) -> StoreResult<()> {
            self.inner.delete(user_id).await
        }

        fn watch(&self, user_id: &str) -> StoreResult<broadcast::Receiver<Value>> {
            self.inner.watch(user_id)
        }
    }

    #[tokio::test]
    async fn test_readiness_awaited_once() {
        let store = Arc::new(CountingStore {
            inner: InMemoryDocumentStore::new(),
            ready_calls: AtomicUsize::new(0),
        });
        let adapter = RemoteStoreAdapter::new(store.clone());

        adapter.load("u1").await.unwrap();
        adapter
            .save("u1", DocumentPatch::new().budget(1.0))
            .await
            .unwrap();
        adapter.load("u1").await.unwrap();

        assert_eq!(store.ready_calls.load(Ordering::SeqCst), 1);
    }
}
