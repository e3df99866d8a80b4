//! Queue of remote writes that failed transiently.
//!
//! The queue itself is in memory; the controller mirrors it into the durable
//! local store after every change so it survives a restart.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::DataKey;
use crate::remote::DocumentPatch;

/// A remote write waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    /// Owner of the document the write targets
    pub user_id: String,
    pub key: DataKey,
    pub patch: DocumentPatch,
    pub queued_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn new(user_id: impl Into<String>, key: DataKey, patch: DocumentPatch) -> Self {
        Self {
            user_id: user_id.into(),
            key,
            patch,
            queued_at: Utc::now(),
        }
    }
}

/// Outcome of one drain of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Failed transiently and went back to the tail
    pub requeued: usize,
    /// Failed permanently; the local copy is all that remains
    pub dropped: usize,
}

impl FlushReport {
    pub fn is_noop(&self) -> bool {
        self.attempted == 0
    }
}

/// FIFO of pending writes.
///
/// Entries are only removed by [`take_all`](Self::take_all); anything that
/// fails again is pushed back at the tail, behind writes queued meanwhile.
#[derive(Debug, Default)]
pub struct PendingWriteQueue {
    entries: Mutex<VecDeque<PendingWrite>>,
}

impl PendingWriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still holds valid entries; losing them would drop writes.
    fn entries(&self) -> MutexGuard<'_, VecDeque<PendingWrite>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail. Returns the new length.
    pub fn push(&self, write: PendingWrite) -> usize {
        let mut entries = self.entries();
        entries.push_back(write);
        entries.len()
    }

    /// Remove every entry, oldest first.
    pub fn take_all(&self) -> Vec<PendingWrite> {
        self.entries().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Whether a write for this user and key is still waiting.
    pub fn contains(&self, user_id: &str, key: DataKey) -> bool {
        self.entries()
            .iter()
            .any(|write| write.user_id == user_id && write.key == key)
    }

    /// Drop every write targeting `user_id`. Returns how many were dropped.
    pub fn discard_user(&self, user_id: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|write| write.user_id != user_id);
        before - entries.len()
    }

    /// Copy of the current entries, oldest first.
    pub fn snapshot(&self) -> Vec<PendingWrite> {
        self.entries().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(user: &str, key: DataKey, budget: f64) -> PendingWrite {
        PendingWrite::new(user, key, DocumentPatch::new().budget(budget))
    }

    #[test]
    fn test_fifo_order_and_requeue_at_tail() {
        let queue = PendingWriteQueue::new();
        assert_eq!(queue.push(write("u1", DataKey::Budget, 1.0)), 1);
        assert_eq!(queue.push(write("u1", DataKey::Budget, 2.0)), 2);

        let mut drained = queue.take_all();
        assert!(queue.is_empty());
        assert_eq!(drained[0].patch, DocumentPatch::new().budget(1.0));

        queue.push(write("u1", DataKey::Expenses, 3.0));
        queue.push(drained.remove(0));

        let order: Vec<DataKey> = queue.snapshot().iter().map(|w| w.key).collect();
        assert_eq!(order, vec![DataKey::Expenses, DataKey::Budget]);
    }

    #[test]
    fn test_contains_matches_user_and_key() {
        let queue = PendingWriteQueue::new();
        queue.push(write("u1", DataKey::Budget, 1.0));

        assert!(queue.contains("u1", DataKey::Budget));
        assert!(!queue.contains("u1", DataKey::Expenses));
        assert!(!queue.contains("u2", DataKey::Budget));
        assert_eq!(queue.len(), 1);
    }
}
