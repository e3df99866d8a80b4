use serde::{Deserialize, Serialize};

use crate::controller::{FlushReport, StorageMode};
use crate::migration::MigrationSummary;

/// Storage mode transition, delivered with both the new and the previous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeEvent {
    pub new: StorageMode,
    pub old: StorageMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// The remote document changed and the in-memory ledger was replaced.
    RemoteSnapshot {
        user_id: String,
        expense_count: usize,
        budget: f64,
    },
    /// A drain of the pending write queue finished.
    QueueFlushed(FlushReport),
}

/// Fire-and-forget messages for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    /// A user signed in while data is still session-scoped.
    UpgradeSuggested { user: String },
    /// The remote store rejected access or is missing; shown once.
    SetupRequired { reason: String },
    /// A remote write failed transiently and was queued.
    WriteQueued { key: String, pending: usize },
    MigrationCompleted(MigrationSummary),
    MigrationFailed { reason: String },
}
