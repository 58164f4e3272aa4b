//! Byte-level wrapping of text parts.
//!
//! Parts are stored as UTF-8 or UTF-16LE text, with or without a byte-order
//! mark. Anything that looks like a different framing (compressed streams,
//! nested archives, other Unicode encodings) is rejected up front so it is
//! never decoded as garbage.

use std::fmt;

use crate::error::{CodecError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];
const UTF32LE_BOM: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const UTF32BE_BOM: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// ASCII prefix of the XPress9 compressed backup stream.
const XPRESS9_SIGNATURE: &[u8] = b"STREAM_STORAGE_SIGNATURE";

/// Text encoding declared for a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
}

impl TextEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
        }
    }

    fn bom(self) -> &'static [u8] {
        match self {
            Self::Utf8 => UTF8_BOM,
            Self::Utf16Le => UTF16LE_BOM,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a foreign framing recognised at the start of `bytes`, if any.
pub fn detect_foreign_wrapping(bytes: &[u8], declared: TextEncoding) -> Option<&'static str> {
    if bytes.starts_with(GZIP_MAGIC) {
        return Some("gzip");
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return Some("zip");
    }
    if bytes.starts_with(XPRESS9_SIGNATURE) || starts_with_utf16le(bytes, XPRESS9_SIGNATURE) {
        return Some("xpress9");
    }
    // UTF-32LE shares its first two bytes with the UTF-16LE mark.
    if bytes.starts_with(UTF32LE_BOM) {
        return Some("utf-32le");
    }
    if bytes.starts_with(UTF32BE_BOM) {
        return Some("utf-32be");
    }
    if bytes.starts_with(UTF16BE_BOM) {
        return Some("utf-16be");
    }
    match declared {
        TextEncoding::Utf16Le if bytes.starts_with(UTF8_BOM) => Some("utf-8 bom on a utf-16 part"),
        TextEncoding::Utf8 if bytes.starts_with(UTF16LE_BOM) => Some("utf-16le bom on a utf-8 part"),
        _ => None,
    }
}

fn starts_with_utf16le(bytes: &[u8], ascii: &[u8]) -> bool {
    let body = bytes.strip_prefix(UTF16LE_BOM).unwrap_or(bytes);
    body.len() >= ascii.len() * 2
        && ascii
            .iter()
            .zip(body.chunks_exact(2))
            .all(|(&c, pair)| pair[0] == c && pair[1] == 0)
}

/// Decode the text of a part in its declared encoding.
pub fn decode_text(part: &str, bytes: &[u8], encoding: TextEncoding) -> Result<String> {
    if let Some(scheme) = detect_foreign_wrapping(bytes, encoding) {
        return Err(CodecError::UnsupportedWrapping {
            part: part.to_string(),
            scheme,
        });
    }
    let body = bytes.strip_prefix(encoding.bom()).unwrap_or(bytes);
    match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|e| CodecError::malformed(part, e.to_string())),
        TextEncoding::Utf16Le => {
            if body.len() % 2 != 0 {
                return Err(CodecError::malformed(
                    part,
                    format!("odd byte length {} for utf-16 text", body.len()),
                ));
            }
            let units = body
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .collect::<std::result::Result<String, _>>()
                .map_err(|e| CodecError::malformed(part, e.to_string()))
        }
    }
}

/// Encode text in `encoding`, without a byte-order mark.
pub fn encode_text(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
        TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_round_trips_without_bom() {
        let bytes = encode_text("{\"a\":\"é\"}", TextEncoding::Utf16Le);
        assert_eq!(&bytes[..2], &[b'{', 0]);
        assert_eq!(
            decode_text("p", &bytes, TextEncoding::Utf16Le).unwrap(),
            "{\"a\":\"é\"}"
        );
    }

    #[test]
    fn matching_bom_is_stripped() {
        let mut bytes = UTF16LE_BOM.to_vec();
        bytes.extend(encode_text("{}", TextEncoding::Utf16Le));
        assert_eq!(decode_text("p", &bytes, TextEncoding::Utf16Le).unwrap(), "{}");

        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"{}");
        assert_eq!(decode_text("p", &bytes, TextEncoding::Utf8).unwrap(), "{}");
    }

    #[test]
    fn foreign_framings_are_named() {
        assert_eq!(
            detect_foreign_wrapping(&[0x1F, 0x8B, 8, 0], TextEncoding::Utf8),
            Some("gzip")
        );
        assert_eq!(
            detect_foreign_wrapping(b"PK\x03\x04rest", TextEncoding::Utf16Le),
            Some("zip")
        );
        assert_eq!(
            detect_foreign_wrapping(&[0xFF, 0xFE, 0, 0, b'{', 0, 0, 0], TextEncoding::Utf16Le),
            Some("utf-32le")
        );
        assert_eq!(
            detect_foreign_wrapping(&[0xFE, 0xFF, 0, b'{'], TextEncoding::Utf16Le),
            Some("utf-16be")
        );
        assert_eq!(
            detect_foreign_wrapping(&[0xEF, 0xBB, 0xBF, b'{'], TextEncoding::Utf16Le),
            Some("utf-8 bom on a utf-16 part")
        );
        let xpress = encode_text("STREAM_STORAGE_SIGNATURE_)!@#$%^&*(", TextEncoding::Utf16Le);
        assert_eq!(
            detect_foreign_wrapping(&xpress, TextEncoding::Utf16Le),
            Some("xpress9")
        );
        assert_eq!(detect_foreign_wrapping(b"{}", TextEncoding::Utf8), None);
    }

    #[test]
    fn odd_length_utf16_is_malformed() {
        let result = decode_text("Report/Layout", &[b'{', 0, b'}'], TextEncoding::Utf16Le);
        assert!(matches!(result, Err(CodecError::MalformedDocument { .. })));
    }

    #[test]
    fn unpaired_surrogate_is_malformed() {
        let result = decode_text("p", &[0x00, 0xD8], TextEncoding::Utf16Le);
        assert!(matches!(result, Err(CodecError::MalformedDocument { .. })));
    }
}
