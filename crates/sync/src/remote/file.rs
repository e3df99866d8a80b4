//! Directory-backed document store.
//!
//! One `{user_id}.json` file per user, the id escaped into a plain file
//! name. Several processes may point at the same directory to share
//! documents; change pushes are only delivered within the process that
//! performed the write.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::broadcast;

use super::document::LAST_UPDATED_FIELD;
use super::error::{StoreError, StoreResult};
use super::traits::{DocumentFields, DocumentStore};
use crate::local::encode_file_stem;

const FILE_EXTENSION: &str = "json";
const WATCH_CAPACITY: usize = 64;

pub struct FileDocumentStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: tokio::sync::Mutex<()>,
    watchers: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl FileDocumentStore {
    /// Open a store over an existing directory. A missing directory is
    /// reported as `not-found` by every call.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Create the directory if needed, then open it.
    pub fn create(root: impl AsRef<Path>) -> StoreResult<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, user_id: &str) -> StoreResult<PathBuf> {
        if user_id.is_empty() {
            return Err(StoreError::invalid_argument("empty user id"));
        }
        Ok(self
            .root
            .join(format!("{}.{FILE_EXTENSION}", encode_file_stem(user_id))))
    }

    async fn ensure_root(&self) -> StoreResult<()> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::not_found(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::not_found(format!(
                "document directory {} does not exist",
                self.root.display()
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_document(&self, path: &Path) -> StoreResult<Option<Value>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(StoreError::internal(format!(
                "corrupt document {}: {err}",
                path.display()
            ))),
        }
    }

    fn notify(&self, user_id: &str, document: Value) {
        let Ok(watchers) = self.watchers.lock() else {
            return;
        };
        if let Some(tx) = watchers.get(user_id) {
            let _ = tx.send(document);
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn ready(&self) -> StoreResult<()> {
        self.ensure_root().await
    }

    async fn merge(&self, user_id: &str, fields: DocumentFields) -> StoreResult<()> {
        let path = self.document_path(user_id)?;
        self.ensure_root().await?;
        let _guard = self.write_lock.lock().await;

        let mut document = match self.read_document(&path).await {
            Ok(Some(Value::Object(existing))) => existing,
            Ok(_) => Map::new(),
            Err(err) if err.code == StoreError::INTERNAL => {
                tracing::warn!(user_id, error = %err, "overwriting corrupt remote document");
                Map::new()
            }
            Err(err) => return Err(err),
        };
        document.extend(fields);
        document.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        let document = Value::Object(document);

        let encoded = serde_json::to_string_pretty(&document)
            .map_err(|err| StoreError::internal(err.to_string()))?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, encoded).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::trace!(user_id, path = %path.display(), "stored remote document");
        self.notify(user_id, document);
        Ok(())
    }

    async fn get(&self, user_id: &str) -> StoreResult<Option<Value>> {
        let path = self.document_path(user_id)?;
        self.ensure_root().await?;
        self.read_document(&path).await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        let path = self.document_path(user_id)?;
        self.ensure_root().await?;
        let _guard = self.write_lock.lock().await;

        match fs::remove_file(&path).await {
            Ok(()) => {
                self.notify(user_id, Value::Null);
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn watch(&self, user_id: &str) -> StoreResult<broadcast::Receiver<Value>> {
        self.document_path(user_id)?;
        let mut watchers = self
            .watchers
            .lock()
            .map_err(|_| StoreError::internal("watcher lock poisoned"))?;
        let tx = watchers
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        Ok(tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> DocumentFields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn setup() -> (TempDir, FileDocumentStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileDocumentStore::create(temp_dir.path().join("remote")).unwrap();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_documents_are_shared_through_directory() {
        let (temp, store) = setup();
        store
            .merge("u1", fields(json!({"budget": 500})))
            .await
            .unwrap();

        let other = FileDocumentStore::new(temp.path().join("remote"));
        other
            .merge("u1", fields(json!({"expenses": []})))
            .await
            .unwrap();

        let doc = store.get("u1").await.unwrap().unwrap();
        assert_eq!(doc["budget"], 500);
        assert_eq!(doc["expenses"], json!([]));
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = FileDocumentStore::new(temp.path().join("absent"));

        let err = store.ready().await.unwrap_err();
        assert_eq!(err.code, StoreError::NOT_FOUND);
        let err = store.get("u1").await.unwrap_err();
        assert_eq!(err.code, StoreError::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_notifies_watchers() {
        let (_temp, store) = setup();
        let mut rx = store.watch("u1").unwrap();

        store.merge("u1", fields(json!({"budget": 1}))).await.unwrap();
        assert_eq!(rx.recv().await.unwrap()["budget"], 1);

        store.delete("u1").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Value::Null);
        assert_eq!(store.get("u1").await.unwrap(), None);

        // Deleting again is fine.
        store.delete("u1").await.unwrap();
    }

    #[tokio::test]
    async fn test_opaque_user_ids_stay_inside_root() {
        let (temp, store) = setup();
        store
            .merge("google-oauth2|1234", fields(json!({"budget": 42.0})))
            .await
            .unwrap();
        store
            .merge("../escape", fields(json!({"budget": 1.0})))
            .await
            .unwrap();

        let document = store.get("google-oauth2|1234").await.unwrap().unwrap();
        assert_eq!(document["budget"], 42.0);
        assert!(store.get("../escape").await.unwrap().is_some());
        assert!(!temp.path().join("escape.json").exists());

        let err = store.get("").await.unwrap_err();
        assert_eq!(err.code, StoreError::INVALID_ARGUMENT);
    }
}
