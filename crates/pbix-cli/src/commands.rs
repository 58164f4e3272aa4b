use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use pbix_codec::Registry;
use pbix_core::{
    ConversionContext, Diagnostic, ExtractOptions, ExtractReport, PackOptions, PackReport,
    PackageSummary, PartRequirements, Settings, describe_package, extract, pack,
};
use pbix_model::PartKind;

use crate::cli::{CompileArgs, ExtractArgs, InfoArgs, PartArgs};

/// Outcome of a conversion command, for the summary printer.
pub struct RunOutcome<R> {
    pub report: R,
    pub diagnostics: Vec<Diagnostic>,
    pub elapsed_ms: u128,
}

pub fn run_extract(args: &ExtractArgs, settings: &Settings) -> Result<RunOutcome<ExtractReport>> {
    let project = args
        .project
        .clone()
        .unwrap_or_else(|| default_project_path(&args.package));
    let span = info_span!("extract", package = %args.package.display());
    let _guard = span.enter();
    let start = Instant::now();

    let options = ExtractOptions::from_settings(settings)
        .with_requirements(requirements(settings, &args.parts))
        .with_stable_ids(settings.stable_ids && !args.no_stable_ids);
    let mut ctx = ConversionContext::new("extract");
    let report = extract(&args.package, &project, &options, &mut ctx).with_context(|| {
        format!(
            "extract {} into {}",
            args.package.display(),
            project.display()
        )
    })?;

    let elapsed_ms = start.elapsed().as_millis();
    info!(elapsed_ms, "extract finished");
    Ok(RunOutcome {
        report,
        diagnostics: ctx.diagnostics().to_vec(),
        elapsed_ms,
    })
}

pub fn run_compile(args: &CompileArgs, settings: &Settings) -> Result<RunOutcome<PackReport>> {
    let package = args
        .package
        .clone()
        .unwrap_or_else(|| default_package_path(&args.project));
    let span = info_span!("compile", project = %args.project.display());
    let _guard = span.enter();
    let start = Instant::now();

    let mut options = PackOptions::from_settings(settings)
        .with_requirements(requirements(settings, &args.parts));
    if let Some(compression) = args.compression {
        options = options.with_compression(compression);
    }
    let mut ctx = ConversionContext::new("compile");
    let report = pack(&args.project, &package, &options, &mut ctx).with_context(|| {
        format!(
            "compile {} into {}",
            args.project.display(),
            package.display()
        )
    })?;

    let elapsed_ms = start.elapsed().as_millis();
    info!(elapsed_ms, "compile finished");
    Ok(RunOutcome {
        report,
        diagnostics: ctx.diagnostics().to_vec(),
        elapsed_ms,
    })
}

pub fn run_info(args: &InfoArgs) -> Result<PackageSummary> {
    describe_package(&args.package, &Registry::default())
        .with_context(|| format!("inspect {}", args.package.display()))
}

/// Environment optional kinds plus the ones given on the command line.
fn requirements(settings: &Settings, parts: &PartArgs) -> PartRequirements {
    let optional: Vec<PartKind> = settings
        .optional_parts
        .iter()
        .chain(&parts.optional)
        .copied()
        .collect();
    PartRequirements::with_optional(&optional)
}

fn default_project_path(package: &Path) -> PathBuf {
    package.with_extension("")
}

fn default_package_path(project: &Path) -> PathBuf {
    project.with_extension("pbix")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbix_model::BlobCollection;

    #[test]
    fn default_paths_swap_the_extension() {
        assert_eq!(
            default_project_path(Path::new("reports/Sales.pbix")),
            PathBuf::from("reports/Sales")
        );
        assert_eq!(
            default_package_path(Path::new("reports/Sales")),
            PathBuf::from("reports/Sales.pbix")
        );
    }

    #[test]
    fn flag_kinds_add_to_environment_kinds() {
        let settings = Settings {
            optional_parts: vec![PartKind::Unrecognized],
            ..Settings::default()
        };
        let parts = PartArgs {
            optional: vec![PartKind::Blobs(BlobCollection::CustomVisuals)],
        };
        let requirements = requirements(&settings, &parts);
        assert!(!requirements.is_required(PartKind::Unrecognized));
        assert!(!requirements.is_required(PartKind::Blobs(BlobCollection::CustomVisuals)));
        assert!(requirements.is_required(PartKind::Document(
            pbix_model::DocumentSlot::Connections
        )));
    }
}
