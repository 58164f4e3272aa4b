//! Writing a package container.
//!
//! Entries go to a temp file next to the destination. Nothing appears at
//! the destination path until [`PackageWriter::finalize`] renames the
//! finished file over it, so a failed write never leaves a partial package.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::content_types::{CONTENT_TYPES_PART, ContentTypes, normalize_part_name};
use crate::error::{ArchiveError, Result};

/// Compression applied to every entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Self::Deflated => CompressionMethod::Deflated,
            Self::Stored => CompressionMethod::Stored,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deflated => "deflated",
            Self::Stored => "stored",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deflated" | "deflate" => Ok(Self::Deflated),
            "stored" | "store" | "none" => Ok(Self::Stored),
            other => Err(format!(
                "unknown compression '{other}' (expected 'deflated' or 'stored')"
            )),
        }
    }
}

/// Streaming writer for a new package.
pub struct PackageWriter {
    target: PathBuf,
    zip: ZipWriter<NamedTempFile>,
    options: SimpleFileOptions,
    written: BTreeSet<String>,
    content_types: ContentTypes,
}

impl PackageWriter {
    /// Start a package that will land at `target` once finalized.
    pub fn create(target: &Path, compression: Compression) -> Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| ArchiveError::Io {
            operation: "create directory",
            path: dir.clone(),
            source: e,
        })?;
        let temp = tempfile::Builder::new()
            .prefix(".pbix-write-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| ArchiveError::Io {
                operation: "create",
                path: dir.clone(),
                source: e,
            })?;

        // Fixed timestamps and permissions keep the output reproducible.
        let options = SimpleFileOptions::default()
            .compression_method(compression.method())
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        tracing::debug!(target = %target.display(), %compression, "creating package");
        Ok(Self {
            target: target.to_path_buf(),
            zip: ZipWriter::new(temp),
            options,
            written: BTreeSet::new(),
            content_types: ContentTypes::new(),
        })
    }

    /// Append one part. Part names must be unique.
    pub fn write_part(&mut self, name: &str, content_type: &str, bytes: &[u8]) -> Result<()> {
        let name = normalize_part_name(name);
        if name == CONTENT_TYPES_PART {
            return Err(ArchiveError::DuplicatePart(name.to_string()));
        }
        if !self.written.insert(name.to_string()) {
            return Err(ArchiveError::DuplicatePart(name.to_string()));
        }
        self.zip
            .start_file(name, self.options)
            .map_err(|e| ArchiveError::zip(&self.target, e))?;
        self.zip.write_all(bytes).map_err(|e| ArchiveError::Io {
            operation: "write",
            path: self.target.clone(),
            source: e,
        })?;
        self.content_types.set_override(name, content_type);
        Ok(())
    }

    /// Number of parts written so far.
    pub fn part_count(&self) -> usize {
        self.written.len()
    }

    /// Write the content types part, flush, and move the package into place.
    pub fn finalize(mut self) -> Result<PathBuf> {
        self.zip
            .start_file(CONTENT_TYPES_PART, self.options)
            .map_err(|e| ArchiveError::zip(&self.target, e))?;
        let content_types = self.content_types.render()?;
        self.zip
            .write_all(content_types.as_bytes())
            .map_err(|e| ArchiveError::Io {
                operation: "write",
                path: self.target.clone(),
                source: e,
            })?;

        let temp = self
            .zip
            .finish()
            .map_err(|e| ArchiveError::zip(&self.target, e))?;
        temp.as_file().sync_all().map_err(|e| ArchiveError::Io {
            operation: "sync",
            path: temp.path().to_path_buf(),
            source: e,
        })?;

        let temp_path = temp.path().to_path_buf();
        temp.persist(&self.target)
            .map_err(|e| ArchiveError::AtomicWriteFailed {
                temp_path,
                target_path: self.target.clone(),
                source: e.error,
            })?;

        tracing::info!(
            target = %self.target.display(),
            parts = self.written.len(),
            "wrote package"
        );
        Ok(self.target)
    }
}
