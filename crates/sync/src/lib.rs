//! Dual-mode storage and synchronization for the expense tracker.
//!
//! Data lives either in local session storage or in a per-user remote
//! document. [`StorageController`] routes every read and write according to
//! the current [`StorageMode`]; the [`MigrationEngine`] moves session data
//! into the remote document when a user signs in; the [`SyncBridge`] keeps the
//! in-memory ledger converged with remote pushes.
//!
//! Modules are organized by responsibility:
//! - [`local`] wraps the session and durable key-value scopes
//! - [`remote`] wraps the remote document store and its providers
//! - [`controller`] owns the mode, the current user, and the pending write queue
//! - [`migration`] merges session data into the remote document
//! - [`bridge`] republishes remote pushes into the shared ledger
//! - [`auth`] reacts to identity changes
//! - [`events`] is the topic-based bus for mode changes, sync activity, and notices
//! - [`workers`] runs the auth and retry loops
//! - [`tracker`] is the facade the application mutates data through
pub mod auth;
pub mod bridge;
pub mod controller;
pub mod error;
pub mod events;
pub mod local;
pub mod migration;
pub mod remote;
pub mod tracker;
pub mod workers;

pub use auth::{AuthError, AuthProvider, AuthSession, AuthTransition, LocalAuthProvider};
pub use bridge::{SharedLedger, SyncBridge};
pub use controller::{
    ConnectionStatus, DataKey, DataSummary, FlushReport, PENDING_KEY, PendingWrite, SaveOutcome,
    StorageController, StorageInfo, StorageMode,
};
pub use error::{Result, SyncError};
pub use events::{Event, EventBus, ModeEvent, Notice, SyncEvent, Topic};
pub use local::{
    FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, LocalPersistence, Partition, Scope,
};
pub use migration::{MigrationEngine, MigrationSummary, merge_expenses};
pub use remote::{
    DocumentStore, FileDocumentStore, InMemoryDocumentStore, RemoteStoreAdapter, StoreError,
    UserDocument,
};
pub use tracker::{Tracker, TrackerError};
pub use workers::{AuthWorker, RetryWorker};
