//! Project folder to package.
//!
//! # Stages
//!
//! 1. **ReadTree** - load the record and parse every managed tree file
//! 2. **EncodeAllParts** - encode every part in packing order
//! 3. **WriteArchive** - stream the parts into a temp package
//! 4. **Finalize** - move the package into place
//!
//! Every part is encoded before the package file is created, and the
//! package is only moved into place once complete.

use std::fs;
use std::path::Path;

use pbix_archive::{Compression, PackageWriter};
use pbix_codec::Registry;
use pbix_model::{
    BlobCollection, DocumentKind, Generation, LogicalModel, PartKind, VERSION_PART, VersionMarker,
};
use pbix_normalization::parse_document;
use pbix_persistence::{
    PersistenceError, ProjectRecord, TreeEntry, classify, document_path, list_managed_files,
    load_record, part_name_for,
};

use crate::context::ConversionContext;
use crate::error::{ConversionError, Result};
use crate::report::{PackReport, PartOutcome, PartStatus};
use crate::requirements::PartRequirements;
use crate::settings::Settings;

/// Options for [`pack`].
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub registry: Registry,
    pub requirements: PartRequirements,
    pub compression: Compression,
}

impl PackOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            requirements: settings.requirements(),
            compression: settings.compression,
            ..Self::default()
        }
    }

    pub fn with_requirements(mut self, requirements: PartRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Project tree contents read from disk.
struct ProjectTree {
    model: LogicalModel,
    record: ProjectRecord,
    outcomes: Vec<PartOutcome>,
}

/// Read the project at `root` into a logical model. Every tree file must
/// parse and every slot in the record's manifest must be present.
pub fn read_project(root: &Path) -> Result<LogicalModel> {
    let mut ctx = ConversionContext::new("read");
    let tree = read_tree(root, &PartRequirements::strict(), &mut ctx)?;
    Ok(tree.model)
}

fn read_tree(
    root: &Path,
    requirements: &PartRequirements,
    ctx: &mut ConversionContext,
) -> Result<ProjectTree> {
    if !root.is_dir() {
        return Err(ConversionError::NotFound {
            path: root.to_path_buf(),
        });
    }
    let record = load_record(root)?.ok_or_else(|| ConversionError::NotAProject {
        path: root.to_path_buf(),
    })?;

    let mut model = LogicalModel::new(VersionMarker::new(record.package_version.clone()));
    model.content_types = record.content_types.clone();
    let mut outcomes = Vec::new();

    for tree_path in list_managed_files(root)? {
        let Some(entry) = classify(&tree_path) else {
            ctx.warn(Some(&tree_path), "ignoring file outside the project layout");
            continue;
        };
        if entry == TreeEntry::Record {
            continue;
        }
        let Some(part) = part_name_for(&entry, &tree_path, &record.part_names) else {
            continue;
        };
        let full_path = root.join(&tree_path);
        let bytes = fs::read(&full_path).map_err(|source| PersistenceError::Io {
            operation: "read",
            path: full_path.clone(),
            source,
        })?;

        let kind = match &entry {
            TreeEntry::Document(slot, _) => PartKind::Document(*slot),
            TreeEntry::Blob(collection, _) => PartKind::Blobs(*collection),
            _ => PartKind::Unrecognized,
        };
        let status = match &entry {
            TreeEntry::Document(slot, doc_kind) => {
                let parsed = String::from_utf8(bytes)
                    .map_err(|e| e.to_string())
                    .and_then(|text| parse_document(*doc_kind, &text).map_err(|e| e.to_string()));
                match parsed {
                    Ok(document) => {
                        model.insert_document(*slot, document);
                        PartStatus::Decoded
                    }
                    Err(reason) if requirements.is_required(kind) => {
                        return Err(ConversionError::PartDecodeFailure {
                            part: tree_path,
                            reason,
                        });
                    }
                    Err(reason) => {
                        ctx.warn(Some(&tree_path), format!("skipping optional part: {reason}"));
                        PartStatus::Skipped { reason }
                    }
                }
            }
            TreeEntry::Blob(..) => match BlobCollection::split_part_name(&part) {
                Some((collection, relative)) => {
                    model.insert_blob(collection, relative, bytes);
                    PartStatus::Preserved
                }
                None => {
                    return Err(ConversionError::PartDecodeFailure {
                        part: tree_path,
                        reason: format!("recorded part name '{part}' is not a blob name"),
                    });
                }
            },
            _ => {
                model.unrecognized.insert(part.clone(), bytes);
                PartStatus::Preserved
            }
        };
        outcomes.push(PartOutcome {
            part,
            tree_path: Some(tree_path),
            status,
        });
    }

    for slot in &record.documents {
        if model.documents.contains_key(slot) {
            continue;
        }
        if requirements.is_required(PartKind::Document(*slot)) {
            return Err(ConversionError::MissingSlot {
                slot: *slot,
                project: root.to_path_buf(),
            });
        }
        ctx.warn(Some(slot.part_name()), "optional document is missing from the tree");
    }

    Ok(ProjectTree {
        model,
        record,
        outcomes,
    })
}

/// Pack the project at `project` into a package at `package`.
pub fn pack(
    project: &Path,
    package: &Path,
    options: &PackOptions,
    ctx: &mut ConversionContext,
) -> Result<PackReport> {
    let span = ctx.span().clone();
    let _guard = span.enter();
    tracing::info!(project = %project.display(), package = %package.display(), "packing project");

    // ------------------------------------------------------------------
    // Stage 1: ReadTree
    // ------------------------------------------------------------------
    let ProjectTree {
        model,
        record,
        outcomes: read_outcomes,
    } = read_tree(project, &options.requirements, ctx)?;
    if !model.version.is_supported() {
        return Err(ConversionError::UnsupportedVersion {
            found: record.package_version,
            expected: Generation::V3,
        });
    }

    // ------------------------------------------------------------------
    // Stage 2: EncodeAllParts
    // ------------------------------------------------------------------
    let parts = encode_parts(&model, &options.registry)?;

    // ------------------------------------------------------------------
    // Stages 3 and 4: WriteArchive, Finalize
    // ------------------------------------------------------------------
    let mut writer = PackageWriter::create(package, options.compression)?;
    for part in &parts {
        writer.write_part(&part.name, &part.content_type, &part.bytes)?;
    }
    writer.finalize()?;

    let mut outcomes: Vec<PartOutcome> = read_outcomes
        .into_iter()
        .filter(|o| matches!(o.status, PartStatus::Skipped { .. }))
        .collect();
    outcomes.extend(parts.into_iter().map(|part| PartOutcome {
        part: part.name,
        tree_path: part.tree_path,
        status: PartStatus::Encoded,
    }));

    tracing::info!(parts = outcomes.len(), "pack complete");
    Ok(PackReport {
        project: project.to_path_buf(),
        package: package.to_path_buf(),
        version: model.version,
        parts: outcomes,
    })
}

struct EncodedPart {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
    tree_path: Option<String>,
}

/// Encode the model in packing order: version, documents by slot, blobs by
/// collection and name, unrecognized parts by name.
fn encode_parts(model: &LogicalModel, registry: &Registry) -> Result<Vec<EncodedPart>> {
    let content_type = |name: &str, kind: Option<DocumentKind>| {
        model
            .content_types
            .get(name)
            .cloned()
            .unwrap_or_else(|| registry.default_content_type(name, kind).to_string())
    };

    let mut parts = vec![EncodedPart {
        name: VERSION_PART.to_string(),
        content_type: content_type(VERSION_PART, None),
        bytes: registry.encode_version(&model.version),
        tree_path: None,
    }];

    for (slot, document) in &model.documents {
        let name = slot.part_name();
        let bytes = registry
            .document_codec(*slot)
            .encode(document)
            .map_err(|e| ConversionError::PartEncodeFailure {
                part: name.to_string(),
                reason: e.to_string(),
            })?;
        parts.push(EncodedPart {
            name: name.to_string(),
            content_type: content_type(name, Some(document.kind())),
            bytes,
            tree_path: Some(document_path(*slot, document.kind())),
        });
    }

    for (collection, blobs) in &model.blobs {
        for (relative, bytes) in blobs {
            let name = collection.part_name(relative);
            parts.push(EncodedPart {
                content_type: content_type(&name, None),
                name,
                bytes: bytes.clone(),
                tree_path: None,
            });
        }
    }

    for (name, bytes) in &model.unrecognized {
        parts.push(EncodedPart {
            name: name.clone(),
            content_type: content_type(name, None),
            bytes: bytes.clone(),
            tree_path: None,
        });
    }

    tracing::debug!(parts = parts.len(), "encoded parts");
    Ok(parts)
}
