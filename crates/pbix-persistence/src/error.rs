//! Persistence error types.
//!
//! All persistence operations return structured errors that provide
//! user-friendly messages and optional remediation hints.

use std::path::PathBuf;
use thiserror::Error;

/// Persistence operation error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// File I/O error.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The metadata record exists but is not valid.
    #[error("Invalid project record {path}: {reason}")]
    InvalidRecord { path: PathBuf, reason: String },

    /// The metadata record uses an unknown format version.
    #[error("Project record version {found} is not supported (supported: {supported})")]
    UnsupportedVersion {
        found: String,
        supported: &'static str,
        path: PathBuf,
    },

    /// Serialization error.
    #[error("Failed to serialize project record")]
    Serialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A tree path is absolute, escapes the root, or names a reserved entry.
    #[error("Invalid project path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Two blobs map to the same file in the tree.
    #[error("'{second}' collides with '{first}' in the project tree")]
    IdentifierCollision { first: String, second: String },

    /// Commit failed. `backup` is set when the rollback was incomplete and
    /// holds the previous files that could not be moved back.
    #[error("Failed to commit project folder {root}")]
    CommitFailed {
        root: PathBuf,
        backup: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                operation, path, ..
            } => {
                format!("Could not {} the file at {}", operation, path.display())
            }
            Self::InvalidRecord { path, reason } => {
                format!(
                    "The project record at {} is not valid: {}",
                    path.display(),
                    reason
                )
            }
            Self::UnsupportedVersion {
                found, supported, ..
            } => {
                format!(
                    "This project was written by a newer tool (record version {found}, \
                    this version reads {supported})."
                )
            }
            Self::Serialization { .. } => {
                "An error occurred while writing the project record.".to_string()
            }
            Self::InvalidPath { path, reason } => {
                format!("The path '{path}' cannot be used in a project tree: {reason}")
            }
            Self::IdentifierCollision { first, second } => {
                format!("The parts '{first}' and '{second}' would be written to the same file.")
            }
            Self::CommitFailed { root, backup, .. } => match backup {
                None => format!(
                    "Could not update the project at {}. The previous contents were restored.",
                    root.display()
                ),
                Some(backup) => format!(
                    "Could not update the project at {}. Some previous files could not be \
                    restored and were left in {}.",
                    root.display(),
                    backup.display()
                ),
            },
        }
    }

    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Io { operation, .. } => {
                if *operation == "read" {
                    Some("Check that the file exists and you have permission to read it.".into())
                } else {
                    Some("Check that you have permission to write to this location.".into())
                }
            }
            Self::InvalidRecord { .. } => {
                Some("Restore .pbixproj.json from version control or extract again.".into())
            }
            Self::UnsupportedVersion { .. } => Some("Update to the latest version.".into()),
            Self::Serialization { .. } | Self::InvalidPath { .. } => None,
            Self::IdentifierCollision { .. } => {
                Some("Rename one of the resources so the names differ by more than case.".into())
            }
            Self::CommitFailed { backup: None, .. } => {
                Some("Close programs holding files in the project folder and try again.".into())
            }
            Self::CommitFailed {
                backup: Some(backup),
                ..
            } => Some(format!(
                "Copy the files in {} back into the project folder before trying again.",
                backup.display()
            )),
        }
    }
}

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
