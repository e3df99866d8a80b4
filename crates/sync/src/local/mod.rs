//! Local key-value scopes and the adapter that reads and writes them.
//!
//! Two scopes exist: a session scope cleared when the process ends and a
//! durable scope that survives restarts. In session mode they are the only
//! storage; in persistent mode the durable scope is a write-through backup
//! for the remote document.

mod error;
mod file;
mod memory;
mod persistence;
mod traits;

pub use error::{LocalStoreError, Result};
pub use file::FileKeyValueStore;
pub(crate) use file::encode_file_stem;
pub use memory::InMemoryKeyValueStore;
pub use persistence::{KEY_SEPARATOR, LocalPersistence, Partition, Scope, storage_key};
pub use traits::KeyValueStore;
