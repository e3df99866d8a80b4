//! Shared bootstrap utilities for expense tracker front-ends.
//!
//! Provides configuration loading, platform directories, and a builder that
//! assembles the storage layer once so CLI or other front-ends can share it.
pub mod builder;
pub mod config;
pub mod dirs;

pub use builder::{SyncBuilder, SyncSetup, WorkerHandles};
pub use config::SyncConfig;
