//! Conversion error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use pbix_archive::ArchiveError;
use pbix_model::{DocumentSlot, Generation};
use pbix_persistence::PersistenceError;

/// Error returned by extraction and packing.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The package or project path does not exist.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// The file is not a package container.
    #[error("{path} is not a package: {reason}")]
    NotAPackage { path: PathBuf, reason: String },

    /// The package is not of the supported generation.
    #[error("unsupported package version '{found}' (expected {expected})")]
    UnsupportedVersion { found: String, expected: Generation },

    /// A required part could not be decoded or normalized.
    #[error("failed to decode part '{part}': {reason}")]
    PartDecodeFailure { part: String, reason: String },

    /// A part could not be encoded back into the package.
    #[error("failed to encode part '{part}': {reason}")]
    PartEncodeFailure { part: String, reason: String },

    /// Moving staged files into the project failed. The project was
    /// restored unless `backup` names where the previous files were left.
    #[error("failed to commit project folder {root}")]
    CommitFailed {
        root: PathBuf,
        backup: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// Two blobs map to the same project file.
    #[error("'{second}' collides with '{first}' in the project tree")]
    IdentifierCollision { first: String, second: String },

    /// A slot the project was extracted with is missing from the tree.
    #[error("required document {slot} is missing from {project}")]
    MissingSlot { slot: DocumentSlot, project: PathBuf },

    /// The folder has no metadata record.
    #[error("{path} is not a project folder (no .pbixproj.json)")]
    NotAProject { path: PathBuf },

    /// An environment setting has an invalid value.
    #[error("invalid value '{value}' for {variable}: {reason}")]
    InvalidSetting {
        variable: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Archive(ArchiveError),

    #[error(transparent)]
    Persistence(PersistenceError),
}

impl ConversionError {
    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => Some("Check the path and try again.".into()),
            Self::NotAPackage { .. } => {
                Some("Make sure the file is a .pbix package saved by Power BI Desktop.".into())
            }
            Self::UnsupportedVersion { expected, .. } => Some(format!(
                "Open and re-save the report in a Power BI Desktop release that writes {expected} packages."
            )),
            Self::PartDecodeFailure { .. } => Some(
                "Mark the part kind optional (PBIXPROJ_OPTIONAL_PARTS or --optional) to skip it."
                    .into(),
            ),
            Self::PartEncodeFailure { .. } => {
                Some("Check the file in the project tree for invalid content.".into())
            }
            Self::CommitFailed { backup: None, .. } => Some(
                "Close programs holding files in the project folder and try again.".into(),
            ),
            Self::CommitFailed {
                backup: Some(backup),
                ..
            } => Some(format!(
                "Copy the files in {} back into the project folder before trying again.",
                backup.display()
            )),
            Self::IdentifierCollision { .. } => {
                Some("Rename one of the resources so the names differ by more than case.".into())
            }
            Self::MissingSlot { .. } => Some(
                "Restore the file from version control, or mark the slot optional.".into(),
            ),
            Self::NotAProject { .. } => {
                Some("Run extract first, or point at the folder that holds .pbixproj.json.".into())
            }
            Self::InvalidSetting { .. } => None,
            Self::Archive(err) => archive_suggestion(err),
            Self::Persistence(err) => err.suggestion(),
        }
    }
}

fn archive_suggestion(err: &ArchiveError) -> Option<String> {
    match err {
        ArchiveError::AtomicWriteFailed { .. } => {
            Some("Free up disk space or write the package to a different location.".into())
        }
        _ => None,
    }
}

impl From<ArchiveError> for ConversionError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io { path, source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::NotFound { path }
            }
            ArchiveError::NotAPackage { path, reason } => Self::NotAPackage { path, reason },
            other => Self::Archive(other),
        }
    }
}

impl From<PersistenceError> for ConversionError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::CommitFailed {
                root,
                backup,
                source,
            } => Self::CommitFailed {
                root,
                backup,
                source,
            },
            PersistenceError::IdentifierCollision { first, second } => {
                Self::IdentifierCollision { first, second }
            }
            other => Self::Persistence(other),
        }
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;
