//! In-memory document store with deterministic fault injection.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::document::LAST_UPDATED_FIELD;
use super::error::{StoreError, StoreResult};
use super::traits::{DocumentFields, DocumentStore};

/// Buffered pushes per watched document before receivers lag.
const WATCH_CAPACITY: usize = 64;

#[derive(Default)]
struct Faults {
    /// Returned by every call until cleared.
    outage: Option<StoreError>,
    /// Returned once each, ahead of any outage.
    queued: VecDeque<StoreError>,
}

#[derive(Default)]
struct Inner {
    documents: RwLock<HashMap<String, Value>>,
    watchers: Mutex<HashMap<String, broadcast::Sender<Value>>>,
    faults: Mutex<Faults>,
    writes: AtomicUsize,
}

/// In-memory implementation of [`DocumentStore`].
///
/// Clones share the same documents, so two controllers built over clones of
/// one store behave like two devices signed into the same account.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<Inner>,
}

fn poisoned() -> StoreError {
    StoreError::internal("document store lock poisoned")
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call with `unavailable` until [`go_online`](Self::go_online).
    pub fn go_offline(&self) {
        self.fail_with(StoreError::unavailable("client is offline"));
    }

    /// Clear a persistent fault set by [`go_offline`](Self::go_offline) or
    /// [`fail_with`](Self::fail_with).
    pub fn go_online(&self) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.outage = None;
        }
    }

    /// Fail every call with `err` until cleared.
    pub fn fail_with(&self, err: StoreError) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.outage = Some(err);
        }
    }

    /// Fail exactly the next call with `err`.
    pub fn fail_next(&self, err: StoreError) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.queued.push_back(err);
        }
    }

    /// Number of successful merges so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Peek at a stored document, bypassing faults.
    pub fn document(&self, user_id: &str) -> Option<Value> {
        self.inner
            .documents
            .read()
            .ok()
            .and_then(|documents| documents.get(user_id).cloned())
    }

    /// Replace a document wholesale and notify watchers, as a write from
    /// another client would.
    pub fn insert_document(&self, user_id: &str, document: Value) {
        if let Ok(mut documents) = self.inner.documents.write() {
            documents.insert(user_id.to_string(), document.clone());
        }
        self.notify(user_id, document);
    }

    fn check_fault(&self) -> StoreResult<()> {
        let mut faults = self.inner.faults.lock().map_err(|_| poisoned())?;
        if let Some(err) = faults.queued.pop_front() {
            return Err(err);
        }
        match &faults.outage {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn notify(&self, user_id: &str, document: Value) {
        let Ok(watchers) = self.inner.watchers.lock() else {
            return;
        };
        if let Some(tx) = watchers.get(user_id) {
            // No live receivers is fine.
            let _ = tx.send(document);
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn merge(&self, user_id: &str, fields: DocumentFields) -> StoreResult<()> {
        self.check_fault()?;

        let snapshot = {
            let mut documents = self.inner.documents.write().map_err(|_| poisoned())?;
            let document = documents
                .entry(user_id.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !document.is_object() {
                *document = Value::Object(Map::new());
            }
            if let Value::Object(existing) = document {
                existing.extend(fields);
                existing.insert(
                    LAST_UPDATED_FIELD.to_string(),
                    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
            }
            document.clone()
        };

        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.notify(user_id, snapshot);
        Ok(())
    }

    async fn get(&self, user_id: &str) -> StoreResult<Option<Value>> {
        self.check_fault()?;
        let documents = self.inner.documents.read().map_err(|_| poisoned())?;
        Ok(documents.get(user_id).cloned())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        self.check_fault()?;
        let removed = self
            .inner
            .documents
            .write()
            .map_err(|_| poisoned())?
            .remove(user_id);
        if removed.is_some() {
            self.notify(user_id, Value::Null);
        }
        Ok(())
    }

    fn watch(&self, user_id: &str) -> StoreResult<broadcast::Receiver<Value>> {
        let mut watchers = self.inner.watchers.lock().map_err(|_| poisoned())?;
        let tx = watchers
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        Ok(tx.subscribe())
    }
}
