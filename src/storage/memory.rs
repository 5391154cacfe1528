//! In-memory file store.

use crate::core::{FileInput, FileRef, FileStoreError};
use crate::storage::traits::FileStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// A [`FileStore`] that keeps upload bytes in a map.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<FileRef, Vec<u8>>>,
    deletes: AtomicU64,
    failing: AtomicBool,
}

impl MemoryFileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an uploaded file.
    pub fn put(&self, file: FileRef, data: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(file, data.into());
    }

    /// Returns `true` if the file is currently held.
    pub fn contains(&self, file: &FileRef) -> bool {
        self.files
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(file)
    }

    /// Number of delete calls that removed a file.
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// While set, every delete fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn delete(&self, file: &FileRef) -> Result<(), FileStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FileStoreError::DeleteFailed {
                reference: file.to_string(),
                reason: "storage backend unavailable".to_string(),
            });
        }

        let removed = self
            .files
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(file);
        if removed.is_some() {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn locate(&self, file: &FileRef) -> Result<FileInput, FileStoreError> {
        let files = self
            .files
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match files.get(file) {
            Some(data) => Ok(FileInput::from_bytes(data.clone()).with_filename(file.as_str())),
            None => Err(FileStoreError::InvalidReference {
                reference: file.to_string(),
                reason: "file does not exist".to_string(),
            }),
        }
    }

    async fn exists(&self, file: &FileRef) -> Result<bool, FileStoreError> {
        Ok(self.contains(file))
    }
}
