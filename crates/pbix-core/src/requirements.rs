//! Which part kinds must convert cleanly for a run to succeed.

use std::collections::BTreeSet;

use pbix_model::{ModelError, PartKind};

/// Required part kinds. Failures in an optional kind are logged and the
/// part is skipped; failures in a required kind fail the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRequirements {
    required: BTreeSet<PartKind>,
}

impl Default for PartRequirements {
    /// Every document slot and unrecognized parts are required; blob
    /// collections are optional.
    fn default() -> Self {
        let required = PartKind::all()
            .into_iter()
            .filter(|kind| !matches!(kind, PartKind::Blobs(_)))
            .collect();
        Self { required }
    }
}

impl PartRequirements {
    /// Every kind required.
    pub fn strict() -> Self {
        Self {
            required: PartKind::all().into_iter().collect(),
        }
    }

    pub fn is_required(&self, kind: PartKind) -> bool {
        self.required.contains(&kind)
    }

    pub fn make_optional(mut self, kind: PartKind) -> Self {
        self.required.remove(&kind);
        self
    }

    /// Defaults with every kind in `optional` made optional.
    pub fn with_optional(optional: &[PartKind]) -> Self {
        optional
            .iter()
            .fold(Self::default(), |req, &kind| req.make_optional(kind))
    }

    /// Parse a comma-separated list of part kinds.
    pub fn parse_kinds(list: &str) -> Result<Vec<PartKind>, ModelError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbix_model::{BlobCollection, DocumentSlot};

    #[test]
    fn defaults_make_blobs_optional() {
        let req = PartRequirements::default();
        assert!(req.is_required(PartKind::Document(DocumentSlot::ReportLayout)));
        assert!(req.is_required(PartKind::Unrecognized));
        assert!(!req.is_required(PartKind::Blobs(BlobCollection::CustomVisuals)));
        assert!(!req.is_required(PartKind::Blobs(BlobCollection::StaticResources)));
    }

    #[test]
    fn parse_list_of_kinds() {
        let kinds = PartRequirements::parse_kinds("LinguisticSchema, Unrecognized,").unwrap();
        assert_eq!(
            kinds,
            vec![
                PartKind::Document(DocumentSlot::LinguisticSchema),
                PartKind::Unrecognized
            ]
        );
        let req = PartRequirements::with_optional(&kinds);
        assert!(!req.is_required(PartKind::Unrecognized));
        assert!(PartRequirements::parse_kinds("Bogus").is_err());
    }
}
