//! Part roles inside a package.
//!
//! A package part is exactly one of: the version marker, one of the fixed
//! structured-document slots, a blob in one of the two open-ended
//! collections, or an unrecognized part that is carried through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Name of the part that carries the package format version.
pub const VERSION_PART: &str = "Version";

/// Fixed structured-document slots.
///
/// Declaration order is the canonical processing and packing order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DocumentSlot {
    Connections,
    ReportLayout,
    ReportMetadata,
    ReportSettings,
    DiagramLayout,
    DiagramState,
    LinguisticSchema,
    DataModelSchema,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 8] = [
        DocumentSlot::Connections,
        DocumentSlot::ReportLayout,
        DocumentSlot::ReportMetadata,
        DocumentSlot::ReportSettings,
        DocumentSlot::DiagramLayout,
        DocumentSlot::DiagramState,
        DocumentSlot::LinguisticSchema,
        DocumentSlot::DataModelSchema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSlot::Connections => "Connections",
            DocumentSlot::ReportLayout => "ReportLayout",
            DocumentSlot::ReportMetadata => "ReportMetadata",
            DocumentSlot::ReportSettings => "ReportSettings",
            DocumentSlot::DiagramLayout => "DiagramLayout",
            DocumentSlot::DiagramState => "DiagramState",
            DocumentSlot::LinguisticSchema => "LinguisticSchema",
            DocumentSlot::DataModelSchema => "DataModelSchema",
        }
    }

    /// Part name inside the container.
    pub fn part_name(&self) -> &'static str {
        match self {
            DocumentSlot::Connections => "Connections",
            DocumentSlot::ReportLayout => "Report/Layout",
            DocumentSlot::ReportMetadata => "Metadata",
            DocumentSlot::ReportSettings => "Settings",
            DocumentSlot::DiagramLayout => "DiagramLayout",
            DocumentSlot::DiagramState => "DiagramState",
            DocumentSlot::LinguisticSchema => "Report/LinguisticSchema",
            DocumentSlot::DataModelSchema => "DataModelSchema",
        }
    }

    pub fn from_part_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.part_name() == name)
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentSlot {
    type Err = ModelError;

    /// Accepts the slot name or the part name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|slot| {
                slot.as_str().eq_ignore_ascii_case(trimmed)
                    || slot.part_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ModelError::UnknownSlot(s.to_string()))
    }
}

/// Open-ended collections of opaque binary blobs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BlobCollection {
    CustomVisuals,
    StaticResources,
}

impl BlobCollection {
    pub const ALL: [BlobCollection; 2] =
        [BlobCollection::CustomVisuals, BlobCollection::StaticResources];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlobCollection::CustomVisuals => "CustomVisuals",
            BlobCollection::StaticResources => "StaticResources",
        }
    }

    /// Part-name prefix, including the trailing slash.
    pub fn part_prefix(&self) -> &'static str {
        match self {
            BlobCollection::CustomVisuals => "Report/CustomVisuals/",
            BlobCollection::StaticResources => "Report/StaticResources/",
        }
    }

    /// Splits a part name into its collection and the name relative to the
    /// collection prefix. Bare prefixes do not name a blob.
    pub fn split_part_name(name: &str) -> Option<(Self, &str)> {
        Self::ALL.into_iter().find_map(|collection| {
            name.strip_prefix(collection.part_prefix())
                .filter(|rest| !rest.is_empty())
                .map(|rest| (collection, rest))
        })
    }

    pub fn part_name(&self, relative: &str) -> String {
        format!("{}{}", self.part_prefix(), relative)
    }
}

impl fmt::Display for BlobCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Granularity at which callers mark parts as required or optional.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PartKind {
    Document(DocumentSlot),
    Blobs(BlobCollection),
    Unrecognized,
}

impl PartKind {
    /// Every kind, documents first.
    pub fn all() -> Vec<PartKind> {
        DocumentSlot::ALL
            .into_iter()
            .map(PartKind::Document)
            .chain(BlobCollection::ALL.into_iter().map(PartKind::Blobs))
            .chain(std::iter::once(PartKind::Unrecognized))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Document(slot) => slot.as_str(),
            PartKind::Blobs(collection) => collection.as_str(),
            PartKind::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PartKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(slot) = trimmed.parse::<DocumentSlot>() {
            return Ok(PartKind::Document(slot));
        }
        if let Some(collection) = BlobCollection::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
        {
            return Ok(PartKind::Blobs(collection));
        }
        if trimmed.eq_ignore_ascii_case("Unrecognized") {
            return Ok(PartKind::Unrecognized);
        }
        Err(ModelError::UnknownPartKind(s.to_string()))
    }
}
