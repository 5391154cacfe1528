//! File input abstraction for path-based and streamed scanning.
//!
//! `FileInput` lets the scan client accept a file by path (scanned where the
//! daemon can see it) or as content pushed over the connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::io::AsyncRead;

/// A file to scan: a path, in-memory bytes, or an async stream.
///
/// # Examples
///
/// ```rust
/// use scanflow::core::FileInput;
///
/// let by_path = FileInput::from_path("/srv/uploads/a.schem");
/// assert_eq!(by_path.filename(), Some("a.schem"));
///
/// let by_bytes = FileInput::from_bytes(b"content".to_vec()).with_filename("a.schem");
/// assert_eq!(by_bytes.filename(), Some("a.schem"));
/// ```
pub enum FileInput {
    /// A file path on disk.
    Path(PathBuf),

    /// In-memory bytes with optional filename.
    Bytes {
        /// The file data.
        data: Vec<u8>,
        /// Optional original filename.
        filename: Option<String>,
    },

    /// An async stream of bytes.
    Stream {
        /// The reader, shared so the input stays `Clone + Sync`.
        reader: Arc<tokio::sync::Mutex<Box<dyn AsyncRead + Send + Unpin>>>,
        /// Optional filename.
        filename: Option<String>,
    },
}

impl std::fmt::Debug for FileInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes { data, filename } => f
                .debug_struct("Bytes")
                .field("data_len", &data.len())
                .field("filename", filename)
                .finish(),
            Self::Stream { filename, .. } => f
                .debug_struct("Stream")
                .field("filename", filename)
                .finish_non_exhaustive(),
        }
    }
}

impl Clone for FileInput {
    fn clone(&self) -> Self {
        match self {
            Self::Path(path) => Self::Path(path.clone()),
            Self::Bytes { data, filename } => Self::Bytes {
                data: data.clone(),
                filename: filename.clone(),
            },
            Self::Stream { reader, filename } => Self::Stream {
                reader: Arc::clone(reader),
                filename: filename.clone(),
            },
        }
    }
}

impl FileInput {
    /// Creates a `FileInput` from a file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a `FileInput` from bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            filename: None,
        }
    }

    /// Creates a `FileInput` from an async reader.
    pub fn from_stream(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Stream {
            reader: Arc::new(tokio::sync::Mutex::new(Box::new(reader))),
            filename: None,
        }
    }

    /// Sets the filename for bytes or stream inputs.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        match &mut self {
            Self::Bytes { filename: f, .. } => *f = Some(filename.into()),
            Self::Stream { filename: f, .. } => *f = Some(filename.into()),
            Self::Path(_) => {}
        }
        self
    }

    /// Returns the filename, if known.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Path(path) => path.file_name().and_then(|n| n.to_str()),
            Self::Bytes { filename, .. } => filename.as_deref(),
            Self::Stream { filename, .. } => filename.as_deref(),
        }
    }

    /// Returns a short description for log fields.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { filename, data } => filename
                .clone()
                .unwrap_or_else(|| format!("<{} bytes>", data.len())),
            Self::Stream { filename, .. } => {
                filename.clone().unwrap_or_else(|| "<stream>".to_string())
            }
        }
    }
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FileInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_input_from_path() {
        let input = FileInput::from_path("/uploads/castle.schem");
        assert!(matches!(
            &input,
            FileInput::Path(p) if p == Path::new("/uploads/castle.schem")
        ));
        assert_eq!(input.filename(), Some("castle.schem"));
        assert_eq!(input.describe(), "/uploads/castle.schem");
    }

    #[test]
    fn test_file_input_stream() {
        let reader = futures::io::Cursor::new(vec![1u8, 2, 3]);
        let input = FileInput::from_stream(reader).with_filename("tower.nbt");
        assert_eq!(input.filename(), Some("tower.nbt"));
        assert_eq!(input.describe(), "tower.nbt");

        let cloned = input.clone();
        assert!(matches!(cloned, FileInput::Stream { .. }));
        assert!(format!("{cloned:?}").contains("tower.nbt"));
    }

    #[test]
    fn test_bytes_describe_without_name() {
        let input = FileInput::from_bytes(vec![0u8; 4]);
        assert_eq!(input.describe(), "<4 bytes>");
        assert_eq!(input.filename(), None);
    }
}
