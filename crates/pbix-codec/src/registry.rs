//! Mapping from part names to codecs.

use std::collections::BTreeMap;

use pbix_model::{
    BlobCollection, Document, DocumentKind, DocumentSlot, VERSION_PART, VersionMarker,
};
use pbix_normalization::{parse_document, to_compact_text};

use crate::error::{CodecError, Result};
use crate::wrapping::{TextEncoding, decode_text, encode_text};

const OCTET_STREAM: &str = "application/octet-stream";

/// How a part is decoded and encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codec {
    /// The package format marker.
    Version(TextEncoding),
    /// A structured document slot.
    Document(DocumentCodec),
    /// One blob of a binary collection.
    Blob(BlobCodec),
    /// Anything else, kept byte-for-byte.
    Unrecognized,
}

/// Codec for one structured-document slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCodec {
    pub slot: DocumentSlot,
    pub encoding: TextEncoding,
}

impl DocumentCodec {
    /// Decode a part payload into a document.
    pub fn decode(&self, bytes: &[u8]) -> Result<Document> {
        let part = self.slot.part_name();
        let text = decode_text(part, bytes, self.encoding)?;
        let kind = self.kind_for_text(&text);
        parse_document(kind, &text).map_err(|e| CodecError::malformed(part, e.to_string()))
    }

    /// Encode a document compactly in the slot's declared encoding.
    pub fn encode(&self, document: &Document) -> Result<Vec<u8>> {
        let text = to_compact_text(document).map_err(|e| CodecError::Encode {
            part: self.slot.part_name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(encode_text(&text, self.encoding))
    }

    /// Document kind stored in this slot. Only the linguistic schema
    /// varies; it is XML when its text opens with a tag.
    pub fn kind_for_text(&self, text: &str) -> DocumentKind {
        match self.slot {
            DocumentSlot::LinguisticSchema
                if text.trim_start_matches('\u{FEFF}').trim_start().starts_with('<') =>
            {
                DocumentKind::Xml
            }
            _ => DocumentKind::Json,
        }
    }
}

/// Codec for one blob of a binary collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobCodec {
    pub collection: BlobCollection,
    /// Part name with the collection prefix removed.
    pub relative: String,
}

/// Declares the wrapping of every known part and hands out codecs.
#[derive(Debug, Clone)]
pub struct Registry {
    version_encoding: TextEncoding,
    encodings: BTreeMap<DocumentSlot, TextEncoding>,
}

impl Default for Registry {
    fn default() -> Self {
        let encodings = DocumentSlot::ALL
            .into_iter()
            .map(|slot| {
                let encoding = match slot {
                    DocumentSlot::Connections => TextEncoding::Utf8,
                    _ => TextEncoding::Utf16Le,
                };
                (slot, encoding)
            })
            .collect();
        Self {
            version_encoding: TextEncoding::Utf16Le,
            encodings,
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the declared encoding of one slot.
    pub fn with_encoding(mut self, slot: DocumentSlot, encoding: TextEncoding) -> Self {
        self.encodings.insert(slot, encoding);
        self
    }

    pub fn encoding_for(&self, slot: DocumentSlot) -> TextEncoding {
        self.encodings
            .get(&slot)
            .copied()
            .unwrap_or(TextEncoding::Utf16Le)
    }

    pub fn document_codec(&self, slot: DocumentSlot) -> DocumentCodec {
        DocumentCodec {
            slot,
            encoding: self.encoding_for(slot),
        }
    }

    /// Codec for a part name. Every name maps to some codec.
    pub fn codec_for(&self, part_name: &str) -> Codec {
        let part_name = part_name.trim_start_matches('/');
        if part_name == VERSION_PART {
            return Codec::Version(self.version_encoding);
        }
        if let Some(slot) = DocumentSlot::from_part_name(part_name) {
            return Codec::Document(self.document_codec(slot));
        }
        if let Some((collection, relative)) = BlobCollection::split_part_name(part_name) {
            return Codec::Blob(BlobCodec {
                collection,
                relative: relative.to_string(),
            });
        }
        Codec::Unrecognized
    }

    /// Decode the version marker part.
    pub fn decode_version(&self, bytes: &[u8]) -> Result<VersionMarker> {
        let text = decode_text(VERSION_PART, bytes, self.version_encoding)?;
        Ok(VersionMarker::new(text.trim_matches('\0').trim()))
    }

    pub fn encode_version(&self, marker: &VersionMarker) -> Vec<u8> {
        encode_text(marker.as_str(), self.version_encoding)
    }

    /// Media type a part gets when the package does not say otherwise.
    /// `kind` selects between JSON and XML for document slots.
    pub fn default_content_type(&self, part_name: &str, kind: Option<DocumentKind>) -> &'static str {
        match self.codec_for(part_name) {
            Codec::Version(_) => "text/plain",
            Codec::Document(_) => kind.unwrap_or(DocumentKind::Json).content_type(),
            Codec::Blob(_) | Codec::Unrecognized => content_type_for_extension(part_name),
        }
    }
}

/// Media type guessed from a file extension.
pub fn content_type_for_extension(name: &str) -> &'static str {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return OCTET_STREAM;
    };
    match extension.to_ascii_lowercase().as_str() {
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_for_every_part_family() {
        let registry = Registry::new();
        assert_eq!(
            registry.codec_for("Version"),
            Codec::Version(TextEncoding::Utf16Le)
        );
        assert_eq!(
            registry.codec_for("Connections"),
            Codec::Document(DocumentCodec {
                slot: DocumentSlot::Connections,
                encoding: TextEncoding::Utf8,
            })
        );
        assert_eq!(
            registry.codec_for("/Report/Layout"),
            Codec::Document(DocumentCodec {
                slot: DocumentSlot::ReportLayout,
                encoding: TextEncoding::Utf16Le,
            })
        );
        assert_eq!(
            registry.codec_for("Report/CustomVisuals/viz/package.json"),
            Codec::Blob(BlobCodec {
                collection: BlobCollection::CustomVisuals,
                relative: "viz/package.json".to_string(),
            })
        );
        assert_eq!(registry.codec_for("DataModel"), Codec::Unrecognized);
        assert_eq!(registry.codec_for("Report/StaticResources/"), Codec::Unrecognized);
    }

    #[test]
    fn default_content_types() {
        let registry = Registry::new();
        assert_eq!(registry.default_content_type("Version", None), "text/plain");
        assert_eq!(
            registry.default_content_type("Report/LinguisticSchema", Some(DocumentKind::Xml)),
            "application/xml"
        );
        assert_eq!(
            registry.default_content_type("Report/StaticResources/Logo.PNG", None),
            "image/png"
        );
        assert_eq!(
            registry.default_content_type("DataModel", None),
            "application/octet-stream"
        );
    }

    #[test]
    fn version_marker_round_trip() {
        let registry = Registry::new();
        let bytes = registry.encode_version(&VersionMarker::new("3.0"));
        let marker = registry.decode_version(&bytes).unwrap();
        assert_eq!(marker.as_str(), "3.0");
        assert!(marker.is_supported());
    }

    #[test]
    fn linguistic_schema_kind_is_sniffed() {
        let codec = Registry::new().document_codec(DocumentSlot::LinguisticSchema);
        assert_eq!(codec.kind_for_text("  <Schema/>"), DocumentKind::Xml);
        assert_eq!(codec.kind_for_text("{\"Version\":1}"), DocumentKind::Json);
    }
}
