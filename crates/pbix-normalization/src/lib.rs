//! Canonical text forms for structured package documents.
//!
//! The extractor writes every document through [`to_canonical_text`], so two
//! extractions of semantically identical packages produce byte-identical
//! files. The packer parses the tree files with [`parse_document`] and
//! re-encodes them compactly with [`to_compact_text`].
//!
//! Normalization is idempotent: `normalize(normalize(d)) == normalize(d)`.

pub mod error;
pub mod json;
pub mod xml;

pub use error::{NormalizeError, Result};
pub use json::{normalize_json, parse_json, render_json, render_json_compact};
pub use xml::{normalize_xml, parse_xml, render_xml, render_xml_compact};

use pbix_model::{Document, DocumentKind};

/// Return the canonical form of a document.
pub fn normalize(doc: &Document) -> Document {
    match doc {
        Document::Json(value) => Document::Json(normalize_json(value)),
        Document::Xml(xml) => Document::Xml(normalize_xml(xml)),
    }
}

/// Render a document in its canonical, human-diffable form.
pub fn to_canonical_text(doc: &Document) -> Result<String> {
    match doc {
        Document::Json(value) => render_json(value),
        Document::Xml(xml) => render_xml(xml),
    }
}

/// Render a document canonically without indentation.
pub fn to_compact_text(doc: &Document) -> Result<String> {
    match doc {
        Document::Json(value) => render_json_compact(value),
        Document::Xml(xml) => render_xml_compact(xml),
    }
}

/// Parse text of the given kind into a document.
pub fn parse_document(kind: DocumentKind, text: &str) -> Result<Document> {
    match kind {
        DocumentKind::Json => Ok(Document::Json(parse_json(text)?)),
        DocumentKind::Xml => Ok(Document::Xml(parse_xml(text)?)),
    }
}
