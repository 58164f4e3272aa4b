//! Obtaining a data model schema for packages that do not carry one.
//!
//! Packages saved with an embedded model store it as a compressed backup
//! instead of a `DataModelSchema` part. Reading that backup needs the
//! analytical engine, which lives outside this crate; callers that have one
//! inject it as a [`SchemaExtractor`].

use std::path::Path;

use pbix_model::Document;

/// Produces the data model schema of a package.
pub trait SchemaExtractor {
    /// Return the schema document for the package at `package`.
    fn extract_data_model_schema(
        &self,
        package: &Path,
    ) -> Result<Document, Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> SchemaExtractor for F
where
    F: Fn(&Path) -> Result<Document, Box<dyn std::error::Error + Send + Sync>>,
{
    fn extract_data_model_schema(
        &self,
        package: &Path,
    ) -> Result<Document, Box<dyn std::error::Error + Send + Sync>> {
        self(package)
    }
}
