//! Background tasks driving the storage layer.
//!
//! The auth worker turns identity changes into session transitions; the retry
//! worker periodically drains the pending write queue. Both are spawned with
//! `tokio::spawn` and stop when their input closes or their handle is aborted.

mod auth;
mod retry;

pub use auth::AuthWorker;
pub use retry::RetryWorker;
