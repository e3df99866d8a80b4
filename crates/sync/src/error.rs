//! Failure taxonomy surfaced by the storage layer.
//!
//! Raw backend failures ([`StoreError`]) are normalized into [`SyncError`] at
//! the remote adapter boundary. Local-store and parse failures never reach
//! this type; they are absorbed by the local persistence adapter.

use thiserror::Error;

use crate::remote::StoreError;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Transient connectivity failure; the write is queued for retry.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// Authorization or configuration problem; surfaced, never retried.
    #[error("permission denied by remote store: {0}")]
    PermissionDenied(String),

    /// Backing store is missing; surfaced, never retried.
    #[error("remote store not found: {0}")]
    NotFound(String),

    /// Data could not be encoded or decoded.
    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("unknown remote failure: {0}")]
    Unknown(String),

    #[error("operation requires a signed-in user")]
    NotAuthenticated,
}

impl SyncError {
    /// Whether the failure should be retried through the pending write queue.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Whether the failure points at a misconfigured or missing backend.
    pub fn needs_setup(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::NotFound(_))
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        let message = err.message;
        match err.code.as_str() {
            StoreError::UNAVAILABLE => Self::Unavailable(message),
            _ if message.to_ascii_lowercase().contains("offline") => Self::Unavailable(message),
            StoreError::PERMISSION_DENIED => Self::PermissionDenied(message),
            StoreError::NOT_FOUND => Self::NotFound(message),
            code => Self::Unknown(format!("{code}: {message}")),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
