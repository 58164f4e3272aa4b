//! Where each part lives in the project tree.
//!
//! Document slots map to fixed file names. Blobs and unrecognized parts are
//! stored under a per-family directory, named by their part name relative
//! to the family, sanitized so the tree can be checked out on any
//! filesystem. Sanitized names are remembered so packing restores the
//! original part name.

use std::collections::BTreeMap;

use pbix_model::{BlobCollection, DocumentKind, DocumentSlot};

use crate::error::{PersistenceError, Result};

/// File name of the metadata record at the tree root.
pub const RECORD_FILE: &str = ".pbixproj.json";

/// Directory holding unrecognized parts.
pub const UNRECOGNIZED_DIR: &str = "Unrecognized";

/// Tree path of a document slot holding a document of `kind`.
pub fn document_path(slot: DocumentSlot, kind: DocumentKind) -> String {
    let stem = match slot {
        DocumentSlot::Connections => "Connections",
        DocumentSlot::ReportLayout => "Report/Layout",
        DocumentSlot::ReportMetadata => "ReportMetadata",
        DocumentSlot::ReportSettings => "ReportSettings",
        DocumentSlot::DiagramLayout => "DiagramLayout",
        DocumentSlot::DiagramState => "DiagramState",
        DocumentSlot::LinguisticSchema => "Report/LinguisticSchema",
        DocumentSlot::DataModelSchema => "Model/DataModelSchema",
    };
    format!("{stem}.{}", kind.extension())
}

/// Inverse of [`document_path`].
pub fn document_for_path(path: &str) -> Option<(DocumentSlot, DocumentKind)> {
    DocumentSlot::ALL.into_iter().find_map(|slot| {
        [DocumentKind::Json, DocumentKind::Xml]
            .into_iter()
            .find(|&kind| document_path(slot, kind) == path)
            .map(|kind| (slot, kind))
    })
}

/// Tree directory of a blob collection.
pub fn collection_dir(collection: BlobCollection) -> &'static str {
    match collection {
        BlobCollection::CustomVisuals => "CustomVisuals",
        BlobCollection::StaticResources => "StaticResources",
    }
}

/// What a managed tree file holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    Record,
    Document(DocumentSlot, DocumentKind),
    /// Blob with its tree name relative to the collection directory.
    Blob(BlobCollection, String),
    /// Unrecognized part with its tree name relative to `Unrecognized/`.
    Unrecognized(String),
}

/// Classify a managed tree path. Files outside the layout return `None`.
pub fn classify(path: &str) -> Option<TreeEntry> {
    if path == RECORD_FILE {
        return Some(TreeEntry::Record);
    }
    if let Some((slot, kind)) = document_for_path(path) {
        return Some(TreeEntry::Document(slot, kind));
    }
    for collection in BlobCollection::ALL {
        if let Some(rest) = path
            .strip_prefix(collection_dir(collection))
            .and_then(|rest| rest.strip_prefix('/'))
        {
            return Some(TreeEntry::Blob(collection, rest.to_string()));
        }
    }
    path.strip_prefix(UNRECOGNIZED_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rest| TreeEntry::Unrecognized(rest.to_string()))
}

/// Make a slash-separated name safe as a relative path on every platform.
///
/// Characters Windows forbids become `_`. Empty, `.` and `..` segments are
/// rejected rather than rewritten.
pub fn sanitize_relative(name: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in name.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(PersistenceError::InvalidPath {
                path: name.to_string(),
                reason: "empty, '.' or '..' segment",
            });
        }
        let cleaned: String = segment
            .chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '\\' | '|' | '?' | '*' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        segments.push(cleaned);
    }
    Ok(segments.join("/"))
}

/// Assigns tree paths to blob and unrecognized parts for one extraction,
/// detecting case-insensitive collisions.
#[derive(Debug, Default)]
pub struct TreeLayout {
    /// Lowercased tree path to the part name that claimed it.
    claimed: BTreeMap<String, String>,
    /// Tree path to original part name, for sanitized names only.
    renamed: BTreeMap<String, String>,
}

impl TreeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree path for a blob of `collection` whose name relative to the
    /// collection prefix is `relative`.
    pub fn blob_path(&mut self, collection: BlobCollection, relative: &str) -> Result<String> {
        let part_name = collection.part_name(relative);
        self.assign(collection_dir(collection), relative, part_name)
    }

    /// Tree path for an unrecognized part.
    pub fn unrecognized_path(&mut self, part_name: &str) -> Result<String> {
        self.assign(UNRECOGNIZED_DIR, part_name, part_name.to_string())
    }

    fn assign(&mut self, dir: &str, relative: &str, part_name: String) -> Result<String> {
        let sanitized = sanitize_relative(relative)?;
        let path = format!("{dir}/{sanitized}");
        let key = path.to_lowercase();
        if let Some(first) = self.claimed.get(&key) {
            return Err(PersistenceError::IdentifierCollision {
                first: first.clone(),
                second: part_name,
            });
        }
        if sanitized != relative {
            self.renamed.insert(path.clone(), part_name.clone());
        }
        self.claimed.insert(key, part_name);
        Ok(path)
    }

    /// Tree paths whose names differ from their part names.
    pub fn renamed(&self) -> &BTreeMap<String, String> {
        &self.renamed
    }

    pub fn into_renamed(self) -> BTreeMap<String, String> {
        self.renamed
    }
}

/// Part name a blob or unrecognized tree file packs back to. `renamed` is
/// the record's `partNames` table.
pub fn part_name_for(entry: &TreeEntry, tree_path: &str, renamed: &BTreeMap<String, String>) -> Option<String> {
    if let Some(original) = renamed.get(tree_path) {
        return Some(original.clone());
    }
    match entry {
        TreeEntry::Blob(collection, relative) => Some(collection.part_name(relative)),
        TreeEntry::Unrecognized(relative) => Some(relative.clone()),
        TreeEntry::Document(slot, _) => Some(slot.part_name().to_string()),
        TreeEntry::Record => None,
    }
}
