//! In-memory form of one package for one conversion run.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::document::Document;
use crate::slot::{BlobCollection, DocumentSlot};
use crate::version::VersionMarker;

/// Decoded package content.
///
/// Blob and unrecognized part maps are keyed so that iteration order is the
/// canonical packing order.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalModel {
    pub version: VersionMarker,
    pub documents: BTreeMap<DocumentSlot, Document>,
    /// Blobs per collection, keyed by name relative to the collection prefix.
    pub blobs: BTreeMap<BlobCollection, BTreeMap<String, Vec<u8>>>,
    /// Parts no codec recognizes, keyed by part name, bytes untouched.
    pub unrecognized: BTreeMap<String, Vec<u8>>,
    /// Declared content type per part name.
    pub content_types: BTreeMap<String, String>,
}

impl LogicalModel {
    pub fn new(version: VersionMarker) -> Self {
        Self {
            version,
            documents: BTreeMap::new(),
            blobs: BTreeMap::new(),
            unrecognized: BTreeMap::new(),
            content_types: BTreeMap::new(),
        }
    }

    pub fn document(&self, slot: DocumentSlot) -> Option<&Document> {
        self.documents.get(&slot)
    }

    pub fn insert_document(&mut self, slot: DocumentSlot, document: Document) {
        self.documents.insert(slot, document);
    }

    pub fn insert_blob(
        &mut self,
        collection: BlobCollection,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) {
        self.blobs
            .entry(collection)
            .or_default()
            .insert(name.into(), bytes);
    }

    pub fn blob(&self, collection: BlobCollection, name: &str) -> Option<&[u8]> {
        self.blobs
            .get(&collection)
            .and_then(|blobs| blobs.get(name))
            .map(Vec::as_slice)
    }

    /// Connection definitions, read by deployment tooling for parameter
    /// substitution.
    pub fn connections(&self) -> Option<&Value> {
        self.document(DocumentSlot::Connections)
            .and_then(Document::as_json)
    }

    /// Tabular model schema, read by deployment tooling for parameter
    /// substitution.
    pub fn data_model_schema(&self) -> Option<&Value> {
        self.document(DocumentSlot::DataModelSchema)
            .and_then(Document::as_json)
    }

    /// Number of parts this model packs into, the version part included.
    pub fn part_count(&self) -> usize {
        1 + self.documents.len()
            + self.blobs.values().map(BTreeMap::len).sum::<usize>()
            + self.unrecognized.len()
    }
}
