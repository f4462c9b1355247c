//! Opaque key-value storage behind the todo store.
//!
//! The store only ever asks for get/set of a byte blob under a key; it has
//! no idea whether the bytes land in a file, a map, or anything else.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from a storage adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Get/set-by-key blob store.
pub trait StorageAdapter {
    /// Read the blob under `key`. A key that was never written is `None`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Overwrite the blob under `key`.
    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// File-backed adapter: each key is one file inside a data directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(dir))]
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|source| StorageError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;
        info!(dir = %dir.display(), "opened file storage");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.data"))
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.key_path(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, file = %path.display(), len = bytes.len(), "read blob");
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.key_path(key);
        debug!(key, file = %path.display(), len = bytes.len(), "writing blob");

        write_atomic(&self.dir, &path, bytes).map_err(|source| StorageError::Write { path, source })
    }
}

/// Write via a named temp file in the same directory, then persist over the
/// target so readers never observe a half-written blob.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// In-memory adapter for tests and embedding. Clones share the same
/// underlying map, so a test can hand one handle to the store and keep
/// another for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blobs.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_storage_roundtrips_bytes() {
        let temp = tempdir().expect("tempdir");
        let storage = FileStorage::open(temp.path()).expect("open storage");

        storage.set("todolist", b"[1,2,3]").expect("set blob");
        let read = storage.get("todolist").expect("get blob");

        assert_eq!(read.as_deref(), Some(b"[1,2,3]".as_slice()));
        assert!(temp.path().join("todolist.data").exists());
    }

    #[test]
    fn file_storage_missing_key_is_none() {
        let temp = tempdir().expect("tempdir");
        let storage = FileStorage::open(temp.path()).expect("open storage");

        assert!(storage.get("todolist").expect("get blob").is_none());
    }

    #[test]
    fn file_storage_set_overwrites() {
        let temp = tempdir().expect("tempdir");
        let storage = FileStorage::open(temp.path()).expect("open storage");

        storage.set("todolist", b"first").expect("set blob");
        storage.set("todolist", b"second").expect("set blob again");

        let read = storage.get("todolist").expect("get blob");
        assert_eq!(read.as_deref(), Some(b"second".as_slice()));
    }

    #[test]
    fn memory_storage_clones_share_blobs() {
        let storage = MemoryStorage::new();
        let observer = storage.clone();

        storage.set("todolist", b"shared").expect("set blob");

        let read = observer.get("todolist").expect("get blob");
        assert_eq!(read.as_deref(), Some(b"shared".as_slice()));
    }
}
