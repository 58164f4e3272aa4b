//! Package to project folder.
//!
//! # Stages
//!
//! 1. **VersionCheck** - open the package and gate on the V3 marker
//! 2. **DecodeAllParts** - decode documents, keep blobs and unknown parts
//! 3. **ResolveIdentifierStability** - restore recorded stable identifiers
//! 4. **NormalizeAll** - render every document canonically
//! 5. **StageAll** - write the tree and record into the staging area
//! 6. **Commit** - swap the staged tree into place
//!
//! Stages 1 and 2 run before the project folder is touched, so a bad
//! package never modifies an existing project.

use std::path::Path;

use pbix_codec::Registry;
use pbix_model::{DocumentSlot, PartKind};
use pbix_normalization::to_canonical_text;
use pbix_persistence::{
    ProjectFolder, ProjectRecord, RECORD_FILE, TreeLayout, compute_file_hash, document_path,
    load_record,
};

use crate::context::ConversionContext;
use crate::error::{ConversionError, Result};
use crate::package::{DecodedPackage, check_version, decode_parts, open_package, record_failure};
use crate::report::{ExtractReport, PartOutcome, PartStatus};
use crate::requirements::PartRequirements;
use crate::schema::SchemaExtractor;
use crate::settings::Settings;
use crate::stability::{StabilityReport, StabilityResolver};

/// Options for [`extract`].
pub struct ExtractOptions {
    pub registry: Registry,
    pub requirements: PartRequirements,
    pub stable_ids: bool,
    pub resolver: StabilityResolver,
    pub schema_extractor: Option<Box<dyn SchemaExtractor>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            registry: Registry::default(),
            requirements: PartRequirements::default(),
            stable_ids: true,
            resolver: StabilityResolver::default(),
            schema_extractor: None,
        }
    }
}

impl ExtractOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            requirements: settings.requirements(),
            stable_ids: settings.stable_ids,
            ..Self::default()
        }
    }

    pub fn with_requirements(mut self, requirements: PartRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_stable_ids(mut self, enabled: bool) -> Self {
        self.stable_ids = enabled;
        self
    }

    pub fn with_schema_extractor(mut self, extractor: Box<dyn SchemaExtractor>) -> Self {
        self.schema_extractor = Some(extractor);
        self
    }
}

/// Extract `package` into the project folder at `project`.
pub fn extract(
    package: &Path,
    project: &Path,
    options: &ExtractOptions,
    ctx: &mut ConversionContext,
) -> Result<ExtractReport> {
    let span = ctx.span().clone();
    let _guard = span.enter();
    tracing::info!(package = %package.display(), project = %project.display(), "extracting package");

    // ------------------------------------------------------------------
    // Stage 1: VersionCheck
    // ------------------------------------------------------------------
    let mut reader = open_package(package)?;
    let version = check_version(&mut reader, &options.registry)?;

    // ------------------------------------------------------------------
    // Stage 2: DecodeAllParts
    // ------------------------------------------------------------------
    let mut decoded = decode_parts(
        &mut reader,
        version,
        &options.registry,
        &options.requirements,
        ctx,
    )?;
    drop(reader);
    if !decoded
        .model
        .documents
        .contains_key(&DocumentSlot::DataModelSchema)
    {
        request_schema(package, options, &mut decoded, ctx);
    }

    let source_hash = compute_file_hash(package)?;
    let previous = load_record(project)?;
    let source_unchanged = previous
        .as_ref()
        .and_then(|record| record.source_hash.as_deref())
        == Some(source_hash.as_str());
    if source_unchanged {
        ctx.note(None, "source package is unchanged since the last extraction");
    }
    let mut record = previous.unwrap_or_else(|| {
        ProjectRecord::new(decoded.model.version.as_str(), ctx.run_at())
    });

    // ------------------------------------------------------------------
    // Stage 3: ResolveIdentifierStability
    // ------------------------------------------------------------------
    let stability = if options.stable_ids {
        match decoded
            .model
            .documents
            .get_mut(&DocumentSlot::DataModelSchema)
            .and_then(pbix_model::Document::as_json_mut)
        {
            Some(schema) => options.resolver.resolve(schema, &mut record.identifiers, ctx),
            None => StabilityReport::default(),
        }
    } else {
        StabilityReport::default()
    };

    // ------------------------------------------------------------------
    // Stages 4 and 5: NormalizeAll, StageAll
    // ------------------------------------------------------------------
    let mut folder = ProjectFolder::open(project)?;
    let mut layout = TreeLayout::new();
    let DecodedPackage {
        model,
        mut outcomes,
        mut failures,
    } = decoded;

    let mut staged_documents = Vec::new();
    for (slot, document) in &model.documents {
        let tree_path = document_path(*slot, document.kind());
        match to_canonical_text(document) {
            Ok(text) => {
                folder.stage(&tree_path, text.as_bytes())?;
                set_tree_path(&mut outcomes, slot.part_name(), &tree_path);
                staged_documents.push(*slot);
            }
            Err(e) => {
                let kind = PartKind::Document(*slot);
                let reason = e.to_string();
                if options.requirements.is_required(kind) {
                    failures.push(crate::package::PartFailure {
                        kind,
                        part: slot.part_name().to_string(),
                        reason: reason.clone(),
                    });
                    set_status(&mut outcomes, slot.part_name(), PartStatus::Failed { reason });
                } else {
                    ctx.warn(Some(slot.part_name()), format!("skipping optional part: {reason}"));
                    set_status(&mut outcomes, slot.part_name(), PartStatus::Skipped { reason });
                }
            }
        }
    }

    for (collection, blobs) in &model.blobs {
        for (relative, bytes) in blobs {
            let tree_path = layout.blob_path(*collection, relative)?;
            folder.stage(&tree_path, bytes)?;
            set_tree_path(&mut outcomes, &collection.part_name(relative), &tree_path);
        }
    }
    for (name, bytes) in &model.unrecognized {
        let tree_path = layout.unrecognized_path(name)?;
        folder.stage(&tree_path, bytes)?;
        set_tree_path(&mut outcomes, name, &tree_path);
    }

    if let Some(failure) = failures.first() {
        tracing::error!(
            failed = failures.len(),
            kind = %failure.kind,
            "required parts failed; discarding staged tree"
        );
        return Err(ConversionError::PartDecodeFailure {
            part: failure.part.clone(),
            reason: failure.reason.clone(),
        });
    }

    record.package_version = model.version.as_str().to_string();
    record.source_hash = Some(source_hash);
    record.documents = staged_documents.into_iter().collect();
    record.content_types = model.content_types.clone();
    record.part_names = layout.into_renamed();
    record.touch(ctx.run_at());
    let record_text = record.to_json()?;
    folder.stage(RECORD_FILE, record_text.as_bytes())?;

    // ------------------------------------------------------------------
    // Stage 6: Commit
    // ------------------------------------------------------------------
    let commit = folder.commit()?;

    tracing::info!(
        parts = outcomes.len(),
        written = commit.written,
        "extraction complete"
    );
    Ok(ExtractReport {
        package: package.to_path_buf(),
        project: project.to_path_buf(),
        version: model.version,
        parts: outcomes,
        stability,
        commit,
        source_unchanged,
    })
}

/// Ask the injected extractor for a schema the package does not carry.
fn request_schema(
    package: &Path,
    options: &ExtractOptions,
    decoded: &mut DecodedPackage,
    ctx: &mut ConversionContext,
) {
    let Some(extractor) = &options.schema_extractor else {
        return;
    };
    let part = DocumentSlot::DataModelSchema.part_name();
    match extractor.extract_data_model_schema(package) {
        Ok(document) => {
            tracing::info!("data model schema supplied by extractor");
            decoded
                .model
                .insert_document(DocumentSlot::DataModelSchema, document);
            decoded.outcomes.push(PartOutcome {
                part: part.to_string(),
                tree_path: None,
                status: PartStatus::Decoded,
            });
        }
        Err(e) => record_failure(
            decoded,
            PartKind::Document(DocumentSlot::DataModelSchema),
            part,
            format!("schema extractor failed: {e}"),
            &options.requirements,
            ctx,
        ),
    }
}

fn set_tree_path(outcomes: &mut [PartOutcome], part: &str, tree_path: &str) {
    if let Some(outcome) = outcomes.iter_mut().find(|o| o.part == part) {
        outcome.tree_path = Some(tree_path.to_string());
    }
}

fn set_status(outcomes: &mut [PartOutcome], part: &str, status: PartStatus) {
    if let Some(outcome) = outcomes.iter_mut().find(|o| o.part == part) {
        outcome.status = status;
    }
}
