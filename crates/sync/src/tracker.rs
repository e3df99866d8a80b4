//! Application-facing facade: mutate the shared ledger, then persist it.

use std::sync::{Arc, PoisonError, RwLockReadGuard};

use thiserror::Error;

use expense_core::{Expense, ExpenseDraft, ExpenseId, Ledger, LedgerError};

use crate::bridge::SharedLedger;
use crate::controller::{SaveOutcome, StorageController};
use crate::error::SyncError;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Expense tracker over a shared ledger.
///
/// Every mutation updates the in-memory ledger first and then saves through
/// the controller. A save that fails permanently is returned as an error,
/// but the in-memory change and its local copy are kept.
pub struct Tracker {
    controller: Arc<StorageController>,
    ledger: SharedLedger,
}

impl Tracker {
    pub fn new(controller: Arc<StorageController>, ledger: SharedLedger) -> Self {
        Self { controller, ledger }
    }

    pub fn controller(&self) -> &Arc<StorageController> {
        &self.controller
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_ledger<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        let mut ledger = self.ledger.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut ledger)
    }

    /// Replace the ledger with what the current mode's store holds.
    pub async fn reload(&self) {
        let expenses = self.controller.load_expenses().await;
        let budget = self.controller.load_budget().await;
        self.with_ledger(|ledger| ledger.replace(expenses, budget));
    }

    pub async fn add_expense(&self, draft: ExpenseDraft) -> Result<(Expense, SaveOutcome)> {
        let (expense, expenses) = self.with_ledger(|ledger| {
            let expense = ledger.add(draft)?;
            Ok::<_, LedgerError>((expense, ledger.expenses().to_vec()))
        })?;
        tracing::debug!(id = expense.id, amount = expense.amount, "expense added");

        let outcome = self.controller.save_expenses(&expenses).await?;
        Ok((expense, outcome))
    }

    /// Remove an expense. Returns `None` if no expense had that id.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<Option<SaveOutcome>> {
        let expenses = self.with_ledger(|ledger| {
            ledger
                .delete(id)
                .then(|| ledger.expenses().to_vec())
        });
        let Some(expenses) = expenses else {
            return Ok(None);
        };
        tracing::debug!(id, "expense deleted");

        Ok(Some(self.controller.save_expenses(&expenses).await?))
    }

    pub async fn set_budget(&self, amount: f64) -> Result<SaveOutcome> {
        self.with_ledger(|ledger| ledger.set_budget(amount))?;
        tracing::debug!(amount, "budget set");
        Ok(self.controller.save_budget(amount).await?)
    }

    pub async fn clear_expenses(&self) -> Result<SaveOutcome> {
        self.with_ledger(Ledger::clear);
        Ok(self.controller.save_expenses(&[]).await?)
    }

    /// Detached copy of the current ledger.
    pub fn snapshot(&self) -> Ledger {
        let ledger = self.read();
        Ledger::with_data(ledger.expenses().to_vec(), ledger.budget())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    use chrono::NaiveDate;
    use expense_core::{Category, UserIdentity};

    use crate::controller::StorageMode;
    use crate::events::EventBus;
    use crate::local::{InMemoryKeyValueStore, LocalPersistence};
    use crate::remote::{InMemoryDocumentStore, RemoteStoreAdapter, StoreError};

    fn setup() -> (InMemoryDocumentStore, Tracker) {
        let store = InMemoryDocumentStore::new();
        let controller = Arc::new(StorageController::open(
            LocalPersistence::new(
                Arc::new(InMemoryKeyValueStore::new()),
                Arc::new(InMemoryKeyValueStore::new()),
            ),
            Arc::new(RemoteStoreAdapter::new(Arc::new(store.clone()))),
            EventBus::new(),
        ));
        let tracker = Tracker::new(controller, Arc::new(RwLock::new(Ledger::new())));
        (store, tracker)
    }

    fn draft(description: &str, amount: f64) -> ExpenseDraft {
        ExpenseDraft::new(
            description,
            amount,
            Category::Transport,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_mutations_persist_and_reload() {
        let (_store, tracker) = setup();
        let (bus, _) = tracker.add_expense(draft("Bus", 2.5)).await.unwrap();
        tracker.add_expense(draft("Taxi", 20.0)).await.unwrap();
        tracker.set_budget(100.0).await.unwrap();
        assert_eq!(
            tracker.delete_expense(bus.id).await.unwrap(),
            Some(SaveOutcome::Stored)
        );
        assert_eq!(tracker.delete_expense(bus.id).await.unwrap(), None);

        tracker.with_ledger(|ledger| ledger.replace(Vec::new(), 0.0));
        tracker.reload().await;

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.expenses().len(), 1);
        assert_eq!(snapshot.expenses()[0].description, "Taxi");
        assert_eq!(snapshot.budget(), 100.0);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_saving() {
        let (_store, tracker) = setup();
        assert!(matches!(
            tracker.add_expense(draft("  ", 1.0)).await,
            Err(TrackerError::Ledger(LedgerError::EmptyDescription))
        ));
        assert!(matches!(
            tracker.set_budget(-5.0).await,
            Err(TrackerError::Ledger(LedgerError::InvalidBudget(_)))
        ));
        assert!(tracker.controller().load_expenses().await.is_empty());
    }

    #[tokio::test]
    async fn test_permanent_remote_failure_keeps_local_change() {
        let (store, tracker) = setup();
        tracker
            .controller()
            .set_current_user(Some(UserIdentity::new("u1")));
        tracker.controller().set_mode(StorageMode::Persistent);
        store.fail_with(StoreError::not_found("database"));

        let err = tracker.add_expense(draft("Train", 9.0)).await.unwrap_err();
        assert!(matches!(err, TrackerError::Sync(SyncError::NotFound(_))));
        assert_eq!(tracker.snapshot().expenses().len(), 1);

        // The durable copy survives for the next successful load.
        store.go_online();
        store.fail_next(StoreError::unavailable("down"));
        assert_eq!(tracker.controller().load_expenses().await.len(), 1);
    }
}
