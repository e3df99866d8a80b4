//! Provider-level errors raised by document store backends.
//!
//! Backends speak in provider codes; the adapter maps them onto
//! [`SyncError`](crate::SyncError).

use thiserror::Error;

/// Raw failure reported by a document store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct StoreError {
    /// Provider error code, e.g. `unavailable` or `permission-denied`
    pub code: String,
    pub message: String,
}

impl StoreError {
    pub const UNAVAILABLE: &'static str = "unavailable";
    pub const PERMISSION_DENIED: &'static str = "permission-denied";
    pub const NOT_FOUND: &'static str = "not-found";
    pub const INVALID_ARGUMENT: &'static str = "invalid-argument";
    pub const INTERNAL: &'static str = "internal";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Self::UNAVAILABLE, message)
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Self::PERMISSION_DENIED, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, message)
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_ARGUMENT, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL, message)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::PermissionDenied => Self::permission_denied(err.to_string()),
            ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::unavailable(err.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
