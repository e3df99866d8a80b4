//! Contract for a raw per-user document store provider.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::error::StoreResult;

/// Top-level fields of a document.
pub type DocumentFields = Map<String, Value>;

/// A remote store holding one JSON document per user id.
///
/// Implementations are thin and stateless per call; they do not queue or
/// retry. All documents are untyped JSON objects so that malformed content
/// written by other clients is visible to (and coerced by) the caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolve once the backend is usable. Awaited a single time by the adapter.
    async fn ready(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Merge `fields` into the user's document, creating it if absent.
    ///
    /// Unspecified fields are left untouched. The store stamps
    /// `lastUpdated` with its own clock.
    async fn merge(&self, user_id: &str, fields: DocumentFields) -> StoreResult<()>;

    /// Fetch the user's full document, `None` if it does not exist.
    async fn get(&self, user_id: &str) -> StoreResult<Option<Value>>;

    /// Remove the user's document entirely.
    async fn delete(&self, user_id: &str) -> StoreResult<()>;

    /// Push channel carrying the full document after every mutation.
    ///
    /// Deleting a document pushes `Value::Null`.
    fn watch(&self, user_id: &str) -> StoreResult<broadcast::Receiver<Value>>;
}
