//! File store trait definition.

use crate::core::{FileInput, FileRef, FileStoreError};

use async_trait::async_trait;
use std::fmt::Debug;

/// Holds uploaded bytes.
///
/// `delete` must be idempotent: deleting a reference that is already gone
/// returns `Ok(())`. Terminal dispositions may be retried after a crash,
/// so a second delete must never turn into a failure.
#[async_trait]
pub trait FileStore: Send + Sync + Debug {
    /// Deletes the file behind `file`, succeeding if it is already absent.
    async fn delete(&self, file: &FileRef) -> Result<(), FileStoreError>;

    /// Returns the scanner input for `file`.
    async fn locate(&self, file: &FileRef) -> Result<FileInput, FileStoreError>;

    /// Returns `true` if the file currently exists.
    async fn exists(&self, file: &FileRef) -> Result<bool, FileStoreError>;
}
