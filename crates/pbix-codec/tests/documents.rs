//! Decode and encode behaviour of document codecs.

use pbix_codec::{Codec, CodecError, Registry, TextEncoding, encode_text};
use pbix_model::{Document, DocumentKind, DocumentSlot};
use serde_json::json;

fn document_codec(registry: &Registry, part: &str) -> pbix_codec::DocumentCodec {
    match registry.codec_for(part) {
        Codec::Document(codec) => codec,
        other => panic!("expected a document codec for {part}, got {other:?}"),
    }
}

#[test]
fn utf16_layout_decodes_and_reencodes_compactly() {
    let registry = Registry::new();
    let codec = document_codec(&registry, "Report/Layout");
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(encode_text(
        "{\n  \"sections\": [],\n  \"id\": 1.0\n}",
        TextEncoding::Utf16Le,
    ));

    let document = codec.decode(&bytes).unwrap();
    assert_eq!(document, Document::Json(json!({"sections": [], "id": 1.0})));

    let encoded = codec.encode(&document).unwrap();
    assert_eq!(
        encoded,
        encode_text(r#"{"id":1,"sections":[]}"#, TextEncoding::Utf16Le)
    );
}

#[test]
fn connections_are_utf8() {
    let registry = Registry::new();
    let codec = document_codec(&registry, "Connections");
    let document = codec.decode(br#"{"Version":3,"Connections":[]}"#).unwrap();
    assert_eq!(codec.encode(&document).unwrap(), br#"{"Connections":[],"Version":3}"#);
}

#[test]
fn xml_linguistic_schema_round_trips() {
    let registry = Registry::new();
    let codec = document_codec(&registry, "Report/LinguisticSchema");
    let xml = r#"<LinguisticSchema Version="2" Language="en-US"><Entities /></LinguisticSchema>"#;
    let document = codec
        .decode(&encode_text(xml, TextEncoding::Utf16Le))
        .unwrap();
    assert_eq!(document.kind(), DocumentKind::Xml);

    let again = codec.decode(&codec.encode(&document).unwrap()).unwrap();
    assert_eq!(
        pbix_normalization::normalize(&again),
        pbix_normalization::normalize(&document)
    );
}

#[test]
fn invalid_json_is_malformed() {
    let codec = Registry::new().document_codec(DocumentSlot::DiagramLayout);
    let result = codec.decode(&encode_text("{not json", TextEncoding::Utf16Le));
    match result {
        Err(CodecError::MalformedDocument { part, .. }) => assert_eq!(part, "DiagramLayout"),
        other => panic!("expected MalformedDocument, got {other:?}"),
    }
}

#[test]
fn gzip_payload_is_unsupported_wrapping() {
    let codec = Registry::new().document_codec(DocumentSlot::DataModelSchema);
    let result = codec.decode(&[0x1F, 0x8B, 0x08, 0x00, 0x00]);
    assert!(matches!(
        result,
        Err(CodecError::UnsupportedWrapping { scheme: "gzip", .. })
    ));
}
