//! Error types raised by local key-value stores.

use thiserror::Error;

/// Errors surfaced by local key-value store implementations.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, LocalStoreError>;
