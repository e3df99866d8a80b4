//! Republishes remote document pushes into the shared in-memory ledger.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use expense_core::Ledger;

use crate::error::Result;
use crate::events::{Event, EventBus, SyncEvent};
use crate::remote::{ChangeListener, RemoteStoreAdapter, UserDocument};

/// Shared application state replaced by remote pushes.
pub type SharedLedger = Arc<RwLock<Ledger>>;

/// Keeps the in-memory ledger converged with the user's remote document.
///
/// Every push replaces expenses and budget wholesale; the remote document is
/// authoritative and no merging happens here.
pub struct SyncBridge {
    adapter: Arc<RemoteStoreAdapter>,
    ledger: SharedLedger,
    events: EventBus,
}

impl SyncBridge {
    pub fn new(adapter: Arc<RemoteStoreAdapter>, ledger: SharedLedger, events: EventBus) -> Self {
        Self {
            adapter,
            ledger,
            events,
        }
    }

    /// Start mirroring `user_id`'s document, replacing any previous
    /// subscription.
    pub async fn attach(&self, user_id: &str) -> Result<()> {
        let ledger = Arc::clone(&self.ledger);
        let events = self.events.clone();
        let owner = user_id.to_string();

        let listener: ChangeListener = Arc::new(move |value: Value| {
            apply_snapshot(&ledger, &events, &owner, &value);
        });
        self.adapter.subscribe(user_id, listener).await?;
        tracing::info!(user_id, "sync bridge attached");
        Ok(())
    }

    /// Stop mirroring. Returns whether a subscription was live.
    pub fn detach(&self) -> bool {
        let detached = self.adapter.unsubscribe();
        if detached {
            tracing::info!("sync bridge detached");
        }
        detached
    }

    pub fn attached_user(&self) -> Option<String> {
        self.adapter.subscribed_user()
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }
}

/// Replace the ledger contents with a pushed document, coercing malformed
/// fields to empty or zero.
pub fn apply_snapshot(ledger: &RwLock<Ledger>, events: &EventBus, user_id: &str, value: &Value) {
    let document = UserDocument::from_value(value);
    let expense_count = document.expenses.len();
    let budget = document.budget;

    ledger
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(document.expenses, budget);

    tracing::debug!(user_id, expense_count, budget, "applied remote snapshot");
    events.publish(Event::Sync(SyncEvent::RemoteSnapshot {
        user_id: user_id.to_string(),
        expense_count,
        budget,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::events::Topic;
    use crate::remote::{DocumentPatch, InMemoryDocumentStore};

    fn expense_json(id: u64) -> Value {
        json!({
            "id": id,
            "description": "Lunch",
            "amount": 12.0,
            "category": "food",
            "date": "2024-02-01",
            "timestamp": "2024-02-01T12:00:00Z"
        })
    }

    #[test]
    fn test_snapshot_replaces_ledger_verbatim() {
        let ledger = RwLock::new(Ledger::new());
        let events = EventBus::new();

        apply_snapshot(
            &ledger,
            &events,
            "u1",
            &json!({"expenses": [expense_json(1), expense_json(2)], "budget": 250}),
        );
        {
            let ledger = ledger.read().unwrap();
            assert_eq!(ledger.expenses().len(), 2);
            assert_eq!(ledger.budget(), 250.0);
        }

        apply_snapshot(&ledger, &events, "u1", &json!({"expenses": {}, "budget": "x"}));
        let ledger = ledger.read().unwrap();
        assert!(ledger.expenses().is_empty());
        assert_eq!(ledger.budget(), 0.0);
    }

    #[tokio::test]
    async fn test_attached_bridge_follows_remote_writes() {
        let store = InMemoryDocumentStore::new();
        let adapter = Arc::new(RemoteStoreAdapter::new(Arc::new(store.clone())));
        let ledger: SharedLedger = Arc::new(RwLock::new(Ledger::new()));
        let events = EventBus::new();
        let mut sync_rx = events.subscribe(Topic::Sync);

        let bridge = SyncBridge::new(Arc::clone(&adapter), Arc::clone(&ledger), events);
        bridge.attach("u1").await.unwrap();
        assert_eq!(bridge.attached_user().as_deref(), Some("u1"));

        // Another device writes to the same document.
        let other_device = RemoteStoreAdapter::new(Arc::new(store.clone()));
        other_device
            .save("u1", DocumentPatch::new().budget(900.0))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), sync_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            Event::Sync(SyncEvent::RemoteSnapshot { budget, .. }) if budget == 900.0
        ));
        assert_eq!(ledger.read().unwrap().budget(), 900.0);

        assert!(bridge.detach());
        assert!(bridge.attached_user().is_none());
    }
}
