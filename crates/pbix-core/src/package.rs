//! Reading packages into a logical model.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use pbix_archive::PackageReader;
use pbix_codec::{Codec, Registry};
use pbix_model::{Generation, LogicalModel, PartKind, VERSION_PART, VersionMarker};

use crate::context::ConversionContext;
use crate::error::{ConversionError, Result};
use crate::report::{PartOutcome, PartStatus};
use crate::requirements::PartRequirements;

pub(crate) type Reader = PackageReader<BufReader<File>>;

/// A part that failed to decode.
#[derive(Debug, Clone)]
pub(crate) struct PartFailure {
    pub kind: PartKind,
    pub part: String,
    pub reason: String,
}

pub(crate) struct DecodedPackage {
    pub model: LogicalModel,
    pub outcomes: Vec<PartOutcome>,
    /// Failures in required kinds.
    pub failures: Vec<PartFailure>,
}

pub(crate) fn open_package(path: &Path) -> Result<Reader> {
    Ok(PackageReader::open(path)?)
}

/// Read and gate the version marker.
pub(crate) fn check_version(reader: &mut Reader, registry: &Registry) -> Result<VersionMarker> {
    let unsupported = |found: String| ConversionError::UnsupportedVersion {
        found,
        expected: Generation::V3,
    };
    let bytes = match reader.read_part(VERSION_PART) {
        Ok(bytes) => bytes,
        Err(pbix_archive::ArchiveError::PartMissing(_)) => {
            return Err(unsupported("<missing>".to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let marker = registry
        .decode_version(&bytes)
        .map_err(|e| unsupported(format!("<undecodable: {e}>")))?;
    if !marker.is_supported() {
        return Err(unsupported(marker.as_str().to_string()));
    }
    tracing::debug!(version = %marker, "package version accepted");
    Ok(marker)
}

/// Decode every part except the version marker.
pub(crate) fn decode_parts(
    reader: &mut Reader,
    version: VersionMarker,
    registry: &Registry,
    requirements: &PartRequirements,
    ctx: &mut ConversionContext,
) -> Result<DecodedPackage> {
    let mut decoded = DecodedPackage {
        model: LogicalModel::new(version),
        outcomes: Vec::new(),
        failures: Vec::new(),
    };

    let parts = reader.list_parts().to_vec();
    for descriptor in parts {
        let name = descriptor.name.as_str();
        let codec = registry.codec_for(name);
        let kind = match &codec {
            Codec::Version(_) => continue,
            Codec::Document(codec) => PartKind::Document(codec.slot),
            Codec::Blob(blob) => PartKind::Blobs(blob.collection),
            Codec::Unrecognized => PartKind::Unrecognized,
        };

        let result = reader
            .read_part(name)
            .map_err(|e| e.to_string())
            .and_then(|bytes| match &codec {
                Codec::Document(codec) => codec
                    .decode(&bytes)
                    .map(|document| {
                        let default = registry.default_content_type(name, Some(document.kind()));
                        decoded.model.insert_document(codec.slot, document);
                        (default, PartStatus::Decoded)
                    })
                    .map_err(|e| e.to_string()),
                Codec::Blob(blob) => {
                    decoded
                        .model
                        .insert_blob(blob.collection, blob.relative.clone(), bytes);
                    Ok((registry.default_content_type(name, None), PartStatus::Preserved))
                }
                _ => {
                    decoded.model.unrecognized.insert(name.to_string(), bytes);
                    Ok((registry.default_content_type(name, None), PartStatus::Preserved))
                }
            });

        match result {
            Ok((default, status)) => {
                tracing::debug!(part = name, status = status.label(), "decoded part");
                if let Some(declared) = &descriptor.content_type
                    && declared != default
                {
                    decoded
                        .model
                        .content_types
                        .insert(name.to_string(), declared.clone());
                }
                decoded.outcomes.push(PartOutcome {
                    part: name.to_string(),
                    tree_path: None,
                    status,
                });
            }
            Err(reason) => record_failure(&mut decoded, kind, name, reason, requirements, ctx),
        }
    }
    Ok(decoded)
}

pub(crate) fn record_failure(
    decoded: &mut DecodedPackage,
    kind: PartKind,
    part: &str,
    reason: String,
    requirements: &PartRequirements,
    ctx: &mut ConversionContext,
) {
    let status = if requirements.is_required(kind) {
        tracing::error!(part, %reason, "required part failed");
        decoded.failures.push(PartFailure {
            kind,
            part: part.to_string(),
            reason: reason.clone(),
        });
        PartStatus::Failed { reason }
    } else {
        ctx.warn(Some(part), format!("skipping optional part: {reason}"));
        PartStatus::Skipped { reason }
    };
    decoded.outcomes.push(PartOutcome {
        part: part.to_string(),
        tree_path: None,
        status,
    });
}

/// Decode a package into a logical model. Every part must decode.
pub fn read_package(path: &Path, registry: &Registry) -> Result<LogicalModel> {
    let mut ctx = ConversionContext::new("read");
    let mut reader = open_package(path)?;
    let version = check_version(&mut reader, registry)?;
    let decoded = decode_parts(
        &mut reader,
        version,
        registry,
        &PartRequirements::strict(),
        &mut ctx,
    )?;
    match decoded.failures.into_iter().next() {
        Some(failure) => Err(ConversionError::PartDecodeFailure {
            part: failure.part,
            reason: failure.reason,
        }),
        None => Ok(decoded.model),
    }
}

/// One row of a package listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSummary {
    pub name: String,
    /// `Version`, the slot name, the collection name, or `Unrecognized`.
    pub role: String,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Listing of a package without decoding its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    /// Version marker text, when the part exists and decodes.
    pub version: Option<String>,
    pub supported: bool,
    pub parts: Vec<PartSummary>,
}

/// List the parts of a package and read its version marker.
pub fn describe_package(path: &Path, registry: &Registry) -> Result<PackageSummary> {
    let mut reader = open_package(path)?;
    let version = reader
        .read_part(VERSION_PART)
        .ok()
        .and_then(|bytes| registry.decode_version(&bytes).ok());
    let parts = reader
        .list_parts()
        .iter()
        .map(|descriptor| {
            let role = match registry.codec_for(&descriptor.name) {
                Codec::Version(_) => VERSION_PART.to_string(),
                Codec::Document(codec) => codec.slot.to_string(),
                Codec::Blob(blob) => blob.collection.to_string(),
                Codec::Unrecognized => PartKind::Unrecognized.to_string(),
            };
            PartSummary {
                name: descriptor.name.clone(),
                role,
                content_type: descriptor.content_type.clone(),
                size: descriptor.size,
            }
        })
        .collect();
    Ok(PackageSummary {
        supported: version.as_ref().is_some_and(VersionMarker::is_supported),
        version: version.map(|v| v.as_str().to_string()),
        parts,
    })
}
