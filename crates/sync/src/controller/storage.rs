//! Routes every read and write to the local scopes or the remote document
//! according to the current storage mode.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use expense_core::{Expense, UserIdentity};

use super::mode::{DataKey, StorageMode};
use super::queue::{FlushReport, PendingWrite, PendingWriteQueue};
use crate::error::{Result, SyncError};
use crate::events::{Event, EventBus, ModeEvent, Notice, SyncEvent};
use crate::local::{LocalPersistence, Partition, Scope, storage_key};
use crate::remote::{DocumentPatch, RemoteStoreAdapter, UserDocument, UserInfo};

/// Durable key holding the persisted storage mode.
pub const MODE_KEY: &str = "storage_mode";

/// Durable key mirroring the pending write queue.
pub const PENDING_KEY: &str = "pending_writes";

/// Callback receiving `(new, old)` on every mode change.
pub type ModeListener = Arc<dyn Fn(StorageMode, StorageMode) + Send + Sync>;

/// How an accepted write was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to the store the current mode targets
    Stored,
    /// Remote was unreachable; the local copy is written and the remote
    /// write waits in the pending queue
    Queued,
}

/// Snapshot of the mode and user for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub mode: StorageMode,
    pub is_session: bool,
    pub is_persistent: bool,
    pub has_user: bool,
    pub user_name: Option<String>,
}

/// Connectivity as observed from the outcome of remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub has_user: bool,
    pub pending_writes: usize,
    /// Error of the most recent remote call, cleared by the next success
    pub last_error: Option<SyncError>,
    pub last_remote_ok: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    /// `Some(false)` after a connectivity failure, `Some(true)` after a
    /// success, `None` before any remote call completed.
    pub fn reachable(&self) -> Option<bool> {
        match (&self.last_error, self.last_remote_ok) {
            (Some(err), _) if err.is_transient() => Some(false),
            (Some(_), _) => Some(true),
            (None, Some(_)) => Some(true),
            (None, None) => None,
        }
    }
}

/// Totals for confirmation prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub expense_count: usize,
    pub total_spent: f64,
    pub budget: f64,
    pub has_data: bool,
}

#[derive(Debug, Default)]
struct RemoteOutcome {
    last_error: Option<SyncError>,
    last_ok: Option<DateTime<Utc>>,
}

/// The storage mode controller.
///
/// Owns the mode, the current user, and the pending write queue. Constructed
/// once at startup and shared by reference.
pub struct StorageController {
    local: LocalPersistence,
    remote: Arc<RemoteStoreAdapter>,
    events: EventBus,
    mode: RwLock<StorageMode>,
    user: RwLock<Option<UserIdentity>>,
    listeners: RwLock<Vec<ModeListener>>,
    queue: PendingWriteQueue,
    /// Held while draining the queue or sending a remote write, so remote
    /// writes reach the store in the order they were accepted.
    drain: tokio::sync::Mutex<()>,
    outcome: Mutex<RemoteOutcome>,
    setup_notice_shown: AtomicBool,
}

impl StorageController {
    /// Build a controller, restoring the persisted mode (session if none)
    /// and any writes still queued by a previous run.
    pub fn open(local: LocalPersistence, remote: Arc<RemoteStoreAdapter>, events: EventBus) -> Self {
        let mode = match local.read_raw(Scope::Durable, MODE_KEY) {
            Some(raw) => StorageMode::from_str(raw.trim()).unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unknown persisted storage mode; using session");
                StorageMode::Session
            }),
            None => StorageMode::Session,
        };
        let queue = PendingWriteQueue::new();
        let restored: Vec<PendingWrite> = local
            .read_json(Scope::Durable, PENDING_KEY)
            .unwrap_or_default();
        if !restored.is_empty() {
            tracing::info!(pending = restored.len(), "restored queued writes");
        }
        for write in restored {
            queue.push(write);
        }
        tracing::debug!(%mode, pending = queue.len(), "storage controller opened");

        Self {
            local,
            remote,
            events,
            mode: RwLock::new(mode),
            user: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            queue,
            drain: tokio::sync::Mutex::new(()),
            outcome: Mutex::new(RemoteOutcome::default()),
            setup_notice_shown: AtomicBool::new(false),
        }
    }

    pub fn local(&self) -> &LocalPersistence {
        &self.local
    }

    pub fn remote(&self) -> &Arc<RemoteStoreAdapter> {
        &self.remote
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Mode and identity
    // ========================================================================

    /// The configured mode.
    pub fn mode(&self) -> StorageMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The mode actually in effect: persistent needs a user.
    pub fn effective_mode(&self) -> StorageMode {
        match self.persistent_user() {
            Some(_) => StorageMode::Persistent,
            None => StorageMode::Session,
        }
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persistent_user(&self) -> Option<UserIdentity> {
        if self.mode().is_persistent() {
            self.current_user()
        } else {
            None
        }
    }

    /// Set and persist the mode, then notify listeners with `(new, old)`.
    ///
    /// Not validated: callers pair `Persistent` with a signed-in user.
    pub fn set_mode(&self, mode: StorageMode) {
        let old = {
            let mut current = self.mode.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, mode)
        };
        if !self.local.write_raw(Scope::Durable, MODE_KEY, mode.as_ref()) {
            tracing::warn!(%mode, "storage mode not persisted");
        }
        tracing::info!(%old, new = %mode, "storage mode set");

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(mode, old);
        }
        self.events.publish(Event::Mode(ModeEvent { new: mode, old }));
    }

    pub fn on_mode_change(&self, listener: impl Fn(StorageMode, StorageMode) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Record the signed-in user, or `None` on sign-out.
    ///
    /// Signing in while in session mode only suggests an upgrade; it never
    /// switches mode. Signing out of persistent mode falls back to session
    /// mode, leaving the remote document in place.
    pub fn set_current_user(&self, user: Option<UserIdentity>) {
        let signed_in = user.is_some();
        self.replace_user(user);
        if signed_in {
            self.suggest_upgrade();
        }
    }

    /// [`set_current_user`](Self::set_current_user) without the upgrade
    /// suggestion, for callers that decide on the upgrade themselves.
    pub(crate) fn replace_user(&self, user: Option<UserIdentity>) {
        let signed_in = user.is_some();
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;

        if !signed_in && self.mode().is_persistent() {
            tracing::info!("user signed out; falling back to session storage");
            self.set_mode(StorageMode::Session);
        }
    }

    /// Suggest switching to persistent storage if a user is signed in while
    /// data is still session-scoped.
    pub fn suggest_upgrade(&self) {
        let Some(user) = self.current_user() else {
            return;
        };
        if self.mode() == StorageMode::Session {
            let label = user.label().to_string();
            tracing::debug!(user = %label, "user signed in while in session mode");
            self.events.notify(Notice::UpgradeSuggested { user: label });
        }
    }

    /// Partition the current mode and user resolve keys into.
    pub fn partition(&self) -> Partition {
        match self.persistent_user() {
            Some(user) => Partition::User(user.id),
            None => Partition::Session,
        }
    }

    /// `<base>_<partition>` for the current mode and user.
    pub fn resolve_key(&self, base: &str) -> String {
        storage_key(base, &self.partition())
    }

    // ========================================================================
    // Save / load
    // ========================================================================

    /// Store `value` under `key` in whatever the current mode targets.
    ///
    /// In persistent mode the durable local copy is always written first.
    /// A connectivity failure queues the remote write and still succeeds;
    /// any other remote failure is returned after the local copy is written.
    pub async fn save_data<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<SaveOutcome> {
        let resolved = self.resolve_key(key);

        let Some(user) = self.persistent_user() else {
            return if self.local.write_session_with_backup(&resolved, value) {
                Ok(SaveOutcome::Stored)
            } else {
                Err(local_write_failed(&resolved))
            };
        };

        let stored_locally = self.local.write_json(Scope::Durable, &resolved, value);
        let Ok(data_key) = DataKey::from_str(key) else {
            tracing::debug!(key, "key has no remote field; stored locally");
            return if stored_locally {
                Ok(SaveOutcome::Stored)
            } else {
                Err(local_write_failed(&resolved))
            };
        };

        let payload = serde_json::to_value(value)?;
        let patch = patch_for(data_key, payload, &user)?;
        match self.push(&user.id, data_key, patch).await? {
            SaveOutcome::Queued if !stored_locally => Err(local_write_failed(&resolved)),
            outcome => Ok(outcome),
        }
    }

    /// Read `key`, substituting `default` for anything absent or malformed.
    ///
    /// In persistent mode the remote document is consulted first and the
    /// durable local copy is the fallback when the remote call fails. While a
    /// write for the key is still queued the local copy is newer than the
    /// remote one and is returned untouched.
    pub async fn load_data<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let resolved = self.resolve_key(key);

        let Some(user) = self.persistent_user() else {
            return self.local.read_session_first(&resolved).unwrap_or(default);
        };

        if let Ok(data_key) = DataKey::from_str(key) {
            match self.fetch(&user.id).await {
                Ok(_) if self.queue.contains(&user.id, data_key) => {
                    tracing::debug!(key, "write still queued; keeping local copy");
                }
                Ok(document) => {
                    let value = match data_key {
                        DataKey::Expenses => serde_json::to_value(&document.expenses),
                        DataKey::Budget => Ok(Value::from(document.budget)),
                    };
                    match value {
                        Ok(value) => {
                            self.local.write_json(Scope::Durable, &resolved, &value);
                            match serde_json::from_value(value) {
                                Ok(decoded) => return decoded,
                                Err(err) => {
                                    tracing::warn!(key, error = %err, "remote value has unexpected shape")
                                }
                            }
                        }
                        Err(err) => tracing::warn!(key, error = %err, "failed to encode remote value"),
                    }
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "remote load failed; using local copy")
                }
            }
        }

        self.local.read_json(Scope::Durable, &resolved).unwrap_or(default)
    }

    pub async fn save_expenses(&self, expenses: &[Expense]) -> Result<SaveOutcome> {
        self.save_data(DataKey::Expenses.as_ref(), expenses).await
    }

    pub async fn save_budget(&self, budget: f64) -> Result<SaveOutcome> {
        self.save_data(DataKey::Budget.as_ref(), &budget).await
    }

    pub async fn load_expenses(&self) -> Vec<Expense> {
        self.load_data(DataKey::Expenses.as_ref(), Vec::new()).await
    }

    pub async fn load_budget(&self) -> f64 {
        self.load_data(DataKey::Budget.as_ref(), 0.0).await
    }

    /// Remote read that first drains older queued writes.
    async fn fetch(&self, user_id: &str) -> Result<UserDocument> {
        let _drain = self.drain.lock().await;
        if !self.queue.is_empty() {
            self.flush_locked().await;
        }
        let result = self.remote.load(user_id).await;
        self.record(&result);
        if let Err(err) = &result {
            self.report_failure(err);
        }
        result
    }

    /// Remote write that never overtakes an older queued write for the same
    /// user and key.
    async fn push(&self, user_id: &str, key: DataKey, patch: DocumentPatch) -> Result<SaveOutcome> {
        // Held across the check and the send: an in-flight drain must not
        // land an older value after this one.
        let _drain = self.drain.lock().await;
        if !self.queue.is_empty() {
            self.flush_locked().await;
        }
        if self.queue.contains(user_id, key) {
            return Ok(self.enqueue(PendingWrite::new(user_id, key, patch)));
        }

        let result = self.remote.save(user_id, patch.clone()).await;
        self.record(&result);
        match result {
            Ok(()) => Ok(SaveOutcome::Stored),
            Err(err) if err.is_transient() => {
                tracing::warn!(user_id, %key, error = %err, "remote write failed; queued for retry");
                Ok(self.enqueue(PendingWrite::new(user_id, key, patch)))
            }
            Err(err) => {
                self.report_failure(&err);
                Err(err)
            }
        }
    }

    fn enqueue(&self, write: PendingWrite) -> SaveOutcome {
        let key = write.key;
        let pending = self.queue.push(write);
        self.persist_queue();
        self.events.notify(Notice::WriteQueued {
            key: key.to_string(),
            pending,
        });
        SaveOutcome::Queued
    }

    // ========================================================================
    // Pending writes
    // ========================================================================

    /// Attempt every queued write once, oldest first, one at a time.
    ///
    /// Transient failures go back to the tail; anything else is dropped from
    /// the queue (its local copy remains) and reported.
    pub async fn flush_pending(&self) -> FlushReport {
        let _drain = self.drain.lock().await;
        self.flush_locked().await
    }

    /// Drain body; the caller holds `drain`.
    ///
    /// The durable mirror is only rewritten once the drain is over, so a
    /// crash mid-drain redelivers rather than loses writes.
    async fn flush_locked(&self) -> FlushReport {
        let pending = self.queue.take_all();
        if pending.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport {
            attempted: pending.len(),
            ..FlushReport::default()
        };
        for write in pending {
            let result = self.remote.save(&write.user_id, write.patch.clone()).await;
            self.record(&result);
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) if err.is_transient() => {
                    self.queue.push(write);
                    report.requeued += 1;
                }
                Err(err) => {
                    tracing::error!(
                        user_id = %write.user_id,
                        key = %write.key,
                        error = %err,
                        "dropping queued write"
                    );
                    self.report_failure(&err);
                    report.dropped += 1;
                }
            }
        }
        self.persist_queue();

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            requeued = report.requeued,
            dropped = report.dropped,
            "pending writes flushed"
        );
        self.events.publish(Event::Sync(SyncEvent::QueueFlushed(report)));
        report
    }

    fn persist_queue(&self) {
        let pending = self.queue.snapshot();
        let persisted = if pending.is_empty() {
            self.local.remove(Scope::Durable, PENDING_KEY)
        } else {
            self.local.write_json(Scope::Durable, PENDING_KEY, &pending)
        };
        if !persisted {
            tracing::warn!(pending = pending.len(), "pending writes not persisted");
        }
    }

    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_snapshot(&self) -> Vec<PendingWrite> {
        self.queue.snapshot()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        ConnectionStatus {
            has_user: self.current_user().is_some(),
            pending_writes: self.queue.len(),
            last_error: outcome.last_error.clone(),
            last_remote_ok: outcome.last_ok,
        }
    }

    fn record<T>(&self, result: &Result<T>) {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(_) => {
                outcome.last_error = None;
                outcome.last_ok = Some(Utc::now());
            }
            Err(err) => outcome.last_error = Some(err.clone()),
        }
    }

    fn report_failure(&self, err: &SyncError) {
        if err.needs_setup() {
            if !self.setup_notice_shown.swap(true, Ordering::SeqCst) {
                self.events.notify(Notice::SetupRequired {
                    reason: err.to_string(),
                });
            }
        } else if !err.is_transient() {
            tracing::error!(error = %err, "remote store failure");
        }
    }

    // ========================================================================
    // Session data and housekeeping
    // ========================================================================

    /// Whether the session partition holds at least one expense.
    pub fn has_session_data(&self) -> bool {
        self.session_expenses().is_some_and(|expenses| !expenses.is_empty())
    }

    /// Expenses and budget stored under the session partition.
    pub fn session_data(&self) -> (Vec<Expense>, f64) {
        let budget = self
            .local
            .read_session_first(&storage_key(DataKey::Budget.as_ref(), &Partition::Session))
            .unwrap_or(0.0);
        (self.session_expenses().unwrap_or_default(), budget)
    }

    fn session_expenses(&self) -> Option<Vec<Expense>> {
        self.local
            .read_session_first(&storage_key(DataKey::Expenses.as_ref(), &Partition::Session))
    }

    /// Remove session-partition data from both local scopes.
    pub fn clear_session_data(&self) {
        for key in [DataKey::Expenses, DataKey::Budget] {
            self.local
                .remove_everywhere(&storage_key(key.as_ref(), &Partition::Session));
        }
        tracing::info!("session data cleared");
    }

    /// Remove the current user's durable local copies and all session data.
    /// The remote document is untouched.
    pub fn clear_local_data(&self) {
        if let Some(user) = self.current_user() {
            let partition = Partition::User(user.id);
            for key in [DataKey::Expenses, DataKey::Budget] {
                self.local
                    .remove(Scope::Durable, &storage_key(key.as_ref(), &partition));
            }
        }
        self.clear_session_data();
    }

    /// Delete the signed-in user's remote document along with any writes
    /// still queued for it.
    pub async fn wipe_remote(&self) -> Result<()> {
        let user = self.current_user().ok_or(SyncError::NotAuthenticated)?;
        let _drain = self.drain.lock().await;
        let discarded = self.queue.discard_user(&user.id);
        if discarded > 0 {
            self.persist_queue();
            tracing::info!(discarded, "discarded queued writes before wipe");
        }

        let result = self.remote.delete(&user.id).await;
        self.record(&result);
        if let Err(err) = &result {
            self.report_failure(err);
        }
        result
    }

    pub fn storage_info(&self) -> StorageInfo {
        let mode = self.mode();
        let user = self.current_user();
        StorageInfo {
            mode,
            is_session: !mode.is_persistent(),
            is_persistent: mode.is_persistent(),
            has_user: user.is_some(),
            user_name: user.and_then(|u| u.display_name),
        }
    }

    pub async fn data_summary(&self) -> DataSummary {
        let expenses = self.load_expenses().await;
        let budget = self.load_budget().await;
        DataSummary {
            expense_count: expenses.len(),
            total_spent: expenses.iter().map(|e| e.amount).sum(),
            budget,
            has_data: !expenses.is_empty() || budget > 0.0,
        }
    }
}

fn patch_for(key: DataKey, payload: Value, user: &UserIdentity) -> Result<DocumentPatch> {
    let patch = DocumentPatch::new().field(key.field(), payload);
    match key {
        DataKey::Expenses => patch.user_info(&UserInfo::from(user)),
        DataKey::Budget => Ok(patch),
    }
}

fn local_write_failed(key: &str) -> SyncError {
    SyncError::Unknown(format!("could not store {key} locally"))
}
