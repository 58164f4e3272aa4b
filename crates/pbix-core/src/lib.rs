//! Conversion between Power BI packages and project folders.
//!
//! - [`extract`]: package to project folder
//! - [`pack`]: project folder to package
//! - [`stability`]: keeps regenerated identifiers stable across extractions
//! - [`settings`]: `PBIXPROJ_*` environment configuration
//!
//! Both directions decode into a [`pbix_model::LogicalModel`] first, so a
//! package and the project extracted from it compare equal through
//! [`read_package`] and [`read_project`].

pub mod context;
pub mod error;
pub mod extract;
pub mod pack;
pub mod package;
pub mod report;
pub mod requirements;
pub mod schema;
pub mod settings;
pub mod stability;

pub use context::{ConversionContext, Diagnostic, Severity};
pub use error::{ConversionError, Result};
pub use extract::{ExtractOptions, extract};
pub use pack::{PackOptions, pack, read_project};
pub use package::{PackageSummary, PartSummary, describe_package, read_package};
pub use report::{ExtractReport, PackReport, PartOutcome, PartStatus};
pub use requirements::PartRequirements;
pub use schema::SchemaExtractor;
pub use settings::{SETTINGS, SettingDef, Settings};
pub use stability::{IdentityStrategy, StabilityReport, StabilityResolver};
