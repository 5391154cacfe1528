//! Filesystem-backed file store.

use crate::core::{FileInput, FileRef, FileStoreError};
use crate::storage::traits::FileStore;

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Stores uploads under a root directory; references are relative paths.
///
/// # Directory Structure
///
/// ```text
/// uploads/
/// └── schematics/2024/05/01/
///     └── castle.schem        # FileRef("schematics/2024/05/01/castle.schem")
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a reference to an absolute path inside the root.
    ///
    /// Absolute references and any `..` component are rejected.
    pub fn path_for(&self, file: &FileRef) -> Result<PathBuf, FileStoreError> {
        let relative = Path::new(file.as_str());
        if file.as_str().is_empty() {
            return Err(FileStoreError::InvalidReference {
                reference: file.to_string(),
                reason: "empty reference".to_string(),
            });
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(FileStoreError::InvalidReference {
                        reference: file.to_string(),
                        reason: "reference escapes the storage root".to_string(),
                    });
                }
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn delete(&self, file: &FileRef) -> Result<(), FileStoreError> {
        let path = self.path_for(file)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(file = %file, path = %path.display(), "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(file = %file, "Upload already absent");
                Ok(())
            }
            Err(e) => Err(FileStoreError::DeleteFailed {
                reference: file.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn locate(&self, file: &FileRef) -> Result<FileInput, FileStoreError> {
        // clamd scans by path, so the daemon must see the same filesystem.
        let path = self.path_for(file)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(FileStoreError::InvalidReference {
                reference: file.to_string(),
                reason: "file does not exist".to_string(),
            });
        }
        Ok(FileInput::from_path(path))
    }

    async fn exists(&self, file: &FileRef) -> Result<bool, FileStoreError> {
        let path = self.path_for(file)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        std::fs::create_dir_all(dir.path().join("schematics")).unwrap();
        std::fs::write(dir.path().join("schematics/a.schem"), b"data").unwrap();
        let file = FileRef::new("schematics/a.schem");

        assert!(store.exists(&file).await.unwrap());
        store.delete(&file).await.unwrap();
        assert!(!store.exists(&file).await.unwrap());

        // Second delete of the same reference is not an error.
        store.delete(&file).await.unwrap();
    }

    #[tokio::test]
    async fn test_locate_resolves_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.schem"), b"data").unwrap();

        let input = store.locate(&FileRef::new("a.schem")).await.unwrap();
        assert!(matches!(&input, FileInput::Path(p) if *p == dir.path().join("a.schem")));

        assert!(store.locate(&FileRef::new("missing.schem")).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_escaping_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        for bad in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            let result = store.delete(&FileRef::new(bad)).await;
            assert!(
                matches!(result, Err(FileStoreError::InvalidReference { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
