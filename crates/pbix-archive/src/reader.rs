//! Reading parts out of a package container.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::content_types::{CONTENT_TYPES_PART, ContentTypes, normalize_part_name};
use crate::error::{ArchiveError, Result};

/// One entry of a package, as listed by [`PackageReader::list_parts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    /// Part name without a leading slash.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Media type from the content types part.
    pub content_type: Option<String>,
}

/// Read-only view of a package.
///
/// Parts are listed in archive order. The content types part is consumed
/// while opening and is not listed.
pub struct PackageReader<R: Read + Seek> {
    source: PathBuf,
    archive: ZipArchive<R>,
    parts: Vec<PartDescriptor>,
    content_types: ContentTypes,
}

impl PackageReader<BufReader<File>> {
    /// Open the package at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ArchiveError::Io {
            operation: "open",
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> PackageReader<R> {
    /// Open a package from any seekable reader. `source` is only used in
    /// error messages.
    pub fn from_reader(reader: R, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let mut archive = ZipArchive::new(reader).map_err(|e| match e {
            ZipError::Io(io) => ArchiveError::Io {
                operation: "read",
                path: source.clone(),
                source: io,
            },
            other => ArchiveError::NotAPackage {
                path: source.clone(),
                reason: other.to_string(),
            },
        })?;

        let mut names = Vec::with_capacity(archive.len());
        let mut seen = BTreeSet::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| ArchiveError::zip(&source, e))?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_part_name(entry.name()).to_string();
            if !seen.insert(name.clone()) {
                return Err(ArchiveError::NotAPackage {
                    path: source,
                    reason: format!("duplicate part name: {name}"),
                });
            }
            names.push((name, entry.size()));
        }

        if !seen.contains(CONTENT_TYPES_PART) {
            return Err(ArchiveError::NotAPackage {
                path: source,
                reason: format!("missing {CONTENT_TYPES_PART}"),
            });
        }

        let content_types = {
            let bytes = read_entry(&mut archive, &source, CONTENT_TYPES_PART)?;
            String::from_utf8(bytes)
                .map_err(|e| ArchiveError::ContentTypes(e.to_string()))
                .and_then(|text| ContentTypes::parse(&text))
                .map_err(|e| ArchiveError::NotAPackage {
                    path: source.clone(),
                    reason: e.to_string(),
                })?
        };

        let parts = names
            .into_iter()
            .filter(|(name, _)| name != CONTENT_TYPES_PART)
            .map(|(name, size)| PartDescriptor {
                content_type: content_types.resolve(&name).map(str::to_string),
                name,
                size,
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            source = %source.display(),
            parts = parts.len(),
            "opened package"
        );

        Ok(Self {
            source,
            archive,
            parts,
            content_types,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Every part except the content types part.
    pub fn list_parts(&self) -> &[PartDescriptor] {
        &self.parts
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Read the full bytes of one part.
    pub fn read_part(&mut self, name: &str) -> Result<Vec<u8>> {
        read_entry(&mut self.archive, &self.source, name)
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    source: &Path,
    name: &str,
) -> Result<Vec<u8>> {
    let name = normalize_part_name(name);
    // Some writers store names with a leading slash.
    let index = archive
        .index_for_name(name)
        .or_else(|| archive.index_for_name(&format!("/{name}")))
        .ok_or_else(|| ArchiveError::PartMissing(name.to_string()))?;
    let mut entry = archive
        .by_index(index)
        .map_err(|e| ArchiveError::zip(source, e))?;
    let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
    entry.read_to_end(&mut bytes).map_err(|e| ArchiveError::Io {
        operation: "read",
        path: source.join(name),
        source: e,
    })?;
    Ok(bytes)
}
