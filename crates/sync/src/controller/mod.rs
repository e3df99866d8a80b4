//! Storage mode controller and the pending write queue.
//!
//! The application reads and writes only through [`StorageController`]; it
//! decides per call whether data goes to the local scopes or to the user's
//! remote document.

mod mode;
mod queue;
mod storage;

pub use mode::{DataKey, StorageMode};
pub use queue::{FlushReport, PendingWrite, PendingWriteQueue};
pub use storage::{
    ConnectionStatus, DataSummary, MODE_KEY, ModeListener, PENDING_KEY, SaveOutcome,
    StorageController, StorageInfo,
};
