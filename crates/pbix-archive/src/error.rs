//! Archive error types.

use std::path::PathBuf;
use thiserror::Error;

/// Package container error.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// File I/O error.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a ZIP container, has duplicate entries, or lacks a
    /// valid content types part.
    #[error("{path} is not a package: {reason}")]
    NotAPackage { path: PathBuf, reason: String },

    /// A part name was written twice.
    #[error("duplicate part name: {0}")]
    DuplicatePart(String),

    /// No entry with this part name exists.
    #[error("part not found: {0}")]
    PartMissing(String),

    /// The content types part could not be parsed.
    #[error("invalid content types part: {0}")]
    ContentTypes(String),

    /// ZIP layer error while reading or writing entries.
    #[error("ZIP error in {path}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The finished temp file couldn't be moved over the destination.
    #[error("Failed to complete write of {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
