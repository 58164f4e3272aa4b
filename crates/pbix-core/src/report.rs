//! Run reports.

use std::fmt;
use std::path::PathBuf;

use pbix_model::VersionMarker;
use pbix_persistence::CommitSummary;

use crate::stability::StabilityReport;

/// What happened to one part during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartStatus {
    /// Decoded into a structured document.
    Decoded,
    /// Kept as opaque bytes.
    Preserved,
    /// Encoded into the package.
    Encoded,
    /// Failed in an optional kind and left out.
    Skipped { reason: String },
    /// Failed in a required kind.
    Failed { reason: String },
}

impl PartStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decoded => "decoded",
            Self::Preserved => "preserved",
            Self::Encoded => "encoded",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Skipped { reason } | Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for PartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartOutcome {
    /// Part name in the package.
    pub part: String,
    /// Path in the project tree, when the part has one.
    pub tree_path: Option<String>,
    pub status: PartStatus,
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub package: PathBuf,
    pub project: PathBuf,
    pub version: VersionMarker,
    pub parts: Vec<PartOutcome>,
    pub stability: StabilityReport,
    pub commit: CommitSummary,
    /// True when the source hash matches the previous extraction.
    pub source_unchanged: bool,
}

impl ExtractReport {
    pub fn skipped(&self) -> impl Iterator<Item = &PartOutcome> {
        self.parts
            .iter()
            .filter(|p| matches!(p.status, PartStatus::Skipped { .. }))
    }
}

/// Result of a successful pack.
#[derive(Debug, Clone)]
pub struct PackReport {
    pub project: PathBuf,
    pub package: PathBuf,
    pub version: VersionMarker,
    pub parts: Vec<PartOutcome>,
}

impl PackReport {
    /// Parts written, the version part included.
    pub fn part_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| p.status == PartStatus::Encoded)
            .count()
    }
}
