//! The `[Content_Types].xml` part.
//!
//! Overrides map a single part name to a media type; defaults map a file
//! extension. Resolution checks the override first.

use std::collections::BTreeMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{ArchiveError, Result};

/// Name of the content types part inside every package.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";

/// Media type table of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Lowercase extension (no dot) to media type.
    defaults: BTreeMap<String, String>,
    /// Part name (no leading slash) to media type.
    overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the XML text of a content types part.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let mut reader = Reader::from_str(text);
        let mut types = Self::new();
        loop {
            let event = reader
                .read_event()
                .map_err(|e| ArchiveError::ContentTypes(e.to_string()))?;
            match event {
                Event::Start(ref start) | Event::Empty(ref start) => {
                    match start.local_name().as_ref() {
                        b"Default" => {
                            let extension = required_attribute(&reader, start, "Extension")?;
                            let content_type = required_attribute(&reader, start, "ContentType")?;
                            types.set_default(&extension, content_type);
                        }
                        b"Override" => {
                            let part = required_attribute(&reader, start, "PartName")?;
                            let content_type = required_attribute(&reader, start, "ContentType")?;
                            types.set_override(&part, content_type);
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn set_default(&mut self, extension: &str, content_type: impl Into<String>) {
        self.defaults.insert(
            extension.trim_start_matches('.').to_ascii_lowercase(),
            content_type.into(),
        );
    }

    pub fn set_override(&mut self, part_name: &str, content_type: impl Into<String>) {
        self.overrides
            .insert(normalize_part_name(part_name).to_string(), content_type.into());
    }

    /// Media type of a part, if the table declares one.
    pub fn resolve(&self, part_name: &str) -> Option<&str> {
        let part_name = normalize_part_name(part_name);
        if let Some(content_type) = self.overrides.get(part_name) {
            return Some(content_type);
        }
        let file_name = part_name.rsplit('/').next().unwrap_or(part_name);
        let (_, extension) = file_name.rsplit_once('.')?;
        self.defaults
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Render the part text. Entries are emitted in sorted order.
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        )?;
        write_event(
            &mut writer,
            Event::Start(
                BytesStart::new("Types").with_attributes([("xmlns", CONTENT_TYPES_NAMESPACE)]),
            ),
        )?;
        for (extension, content_type) in &self.defaults {
            let element = BytesStart::new("Default").with_attributes([
                ("Extension", extension.as_str()),
                ("ContentType", content_type.as_str()),
            ]);
            write_event(&mut writer, Event::Empty(element))?;
        }
        for (part, content_type) in &self.overrides {
            let part_name = format!("/{part}");
            let element = BytesStart::new("Override").with_attributes([
                ("PartName", part_name.as_str()),
                ("ContentType", content_type.as_str()),
            ]);
            write_event(&mut writer, Event::Empty(element))?;
        }
        write_event(&mut writer, Event::End(BytesEnd::new("Types")))?;
        String::from_utf8(writer.into_inner()).map_err(|e| ArchiveError::ContentTypes(e.to_string()))
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| ArchiveError::ContentTypes(e.to_string()))
}

fn required_attribute(reader: &Reader<&[u8]>, start: &BytesStart<'_>, name: &str) -> Result<String> {
    let attribute = start
        .try_get_attribute(name)
        .map_err(|e| ArchiveError::ContentTypes(e.to_string()))?
        .ok_or_else(|| {
            ArchiveError::ContentTypes(format!("element is missing the {name} attribute"))
        })?;
    attribute
        .decode_and_unescape_value(reader.decoder())
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ArchiveError::ContentTypes(e.to_string()))
}

/// Part names are compared without their leading slash.
pub(crate) fn normalize_part_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="json" ContentType="application/json" />
  <Default Extension="PNG" ContentType="image/png" />
  <Override PartName="/Version" ContentType="text/plain" />
  <Override PartName="/Report/Layout" ContentType="application/json" />
</Types>"#;

    #[test]
    fn override_wins_over_default() {
        let types = ContentTypes::parse(SAMPLE).unwrap();
        assert_eq!(types.resolve("Version"), Some("text/plain"));
        assert_eq!(types.resolve("/Report/Layout"), Some("application/json"));
        assert_eq!(
            types.resolve("Report/StaticResources/logo.png"),
            Some("image/png")
        );
        assert_eq!(types.resolve("DataModel"), None);
    }

    #[test]
    fn render_parses_back() {
        let types = ContentTypes::parse(SAMPLE).unwrap();
        let text = types.render().unwrap();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="utf-8"?><Types xmlns="#));
        assert!(text.contains(r#"<Override PartName="/Version" ContentType="text/plain"/>"#));
        let again = ContentTypes::parse(&text).unwrap();
        assert_eq!(again, types);
    }

    #[test]
    fn render_escapes_attribute_values() {
        let mut types = ContentTypes::new();
        types.set_override("a&b", "text/\"odd\"");
        let again = ContentTypes::parse(&types.render().unwrap()).unwrap();
        assert_eq!(again.resolve("a&b"), Some("text/\"odd\""));
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let result = ContentTypes::parse(r#"<Types><Override PartName="/x" /></Types>"#);
        assert!(matches!(result, Err(ArchiveError::ContentTypes(_))));
    }
}
