//! File-based KeyValueStore, the durable scope.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::{LocalStoreError, Result};
use super::traits::KeyValueStore;

const FILE_EXTENSION: &str = "json";

/// File-based implementation of KeyValueStore.
///
/// Each key is stored as `{stem}.json` under the base directory, where the
/// stem is [`encode_file_stem`] of the key. Writes go to a temp file first
/// and are renamed into place, so a crash never leaves a half-written value
/// behind.
pub struct FileKeyValueStore {
    base_dir: PathBuf,
}

impl FileKeyValueStore {
    /// Create a new file-based store, creating the directory if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the path to a key's file.
    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(LocalStoreError::InvalidKey(key.to_string()));
        }
        Ok(self
            .base_dir
            .join(format!("{}.{FILE_EXTENSION}", encode_file_stem(key))))
    }
}

/// Map an arbitrary key or user id to a single portable file name stem.
///
/// ASCII letters, digits, and `_ @ -` are kept, as is `.` anywhere but the
/// first position. Every other byte becomes `%` and two hex digits, so path
/// separators never survive.
pub(crate) fn encode_file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric()
            || matches!(byte, b'_' | b'@' | b'-')
            || (byte == b'.' && i > 0);
        if plain {
            stem.push(char::from(byte));
        } else {
            stem.push('%');
            stem.push_str(&hex::encode_upper([byte]));
        }
    }
    stem
}

/// Inverse of [`encode_file_stem`]. `None` for names it cannot produce.
pub(crate) fn decode_file_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let digits = tail.get(..2)?;
            bytes.extend(hex::decode(digits).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        tracing::trace!(key, path = %path.display(), "stored local entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::trace!(key, "removed local entry");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(filename) = path.file_name().and_then(|s| s.to_str())
                && let Some(stem) = filename.strip_suffix(".json")
            {
                match decode_file_stem(stem) {
                    Some(key) => keys.push(key),
                    None => tracing::warn!(filename, "skipping unrecognized file"),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
