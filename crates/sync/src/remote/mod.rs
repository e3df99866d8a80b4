//! Remote per-user document store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              RemoteStoreAdapter              │
//! │  readiness · error taxonomy · subscription   │
//! └──────────────────────────────────────────────┘
//!                       │
//!            DocumentStore trait (raw provider)
//!            ↑                          ↑
//! ┌──────────┴──────────┐   ┌───────────┴─────────┐
//! │InMemoryDocumentStore│   │  FileDocumentStore  │
//! │ (tests, faults)     │   │  (shared directory) │
//! └─────────────────────┘   └─────────────────────┘
//! ```
//!
//! Each user owns exactly one document with the fields `expenses`, `budget`,
//! `lastUpdated`, and `userInfo`. Writes merge fields; they never replace the
//! whole document.

mod adapter;
mod document;
mod error;
mod file;
mod memory;
mod traits;

pub use adapter::{ChangeListener, RemoteStoreAdapter};
pub use document::{
    BUDGET_FIELD, DocumentPatch, EXPENSES_FIELD, LAST_UPDATED_FIELD, USER_INFO_FIELD,
    UserDocument, UserInfo,
};
pub use error::{StoreError, StoreResult};
pub use file::FileDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use traits::{DocumentFields, DocumentStore};
