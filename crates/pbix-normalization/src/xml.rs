//! Canonical XML.
//!
//! Parsing resolves entity references into plain text. The canonical form
//! sorts attributes by qualified name and drops whitespace-only text nodes,
//! so indentation in the source never leaks into the output. Rendering emits
//! a fixed UTF-8 declaration and two-space indentation.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

use pbix_model::{XmlDocument, XmlElement, XmlNode};

use crate::error::{NormalizeError, Result};

/// Parse XML text into a document tree.
pub fn parse_xml(text: &str) -> Result<XmlDocument> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut prolog = Vec::new();
    let mut epilog = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut stack: Vec<XmlElement> = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| NormalizeError::xml(position, e.to_string()))?;
        match event {
            Event::Decl(_) => {}
            Event::DocType(_) => {
                return Err(NormalizeError::xml(position, "DOCTYPE is not supported"));
            }
            Event::Start(start) => {
                stack.push(element_from_start(&reader, &start, position)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&reader, &start, position)?;
                attach_element(element, &mut stack, &mut root, position)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| NormalizeError::xml(position, "unexpected closing tag"))?;
                attach_element(element, &mut stack, &mut root, position)?;
            }
            Event::Text(text) => {
                let decoded = text
                    .decode()
                    .map_err(|e| NormalizeError::xml(position, e.to_string()))?;
                push_text(&mut stack, &decoded, position)?;
            }
            Event::GeneralRef(reference) => {
                let resolved = match reference
                    .resolve_char_ref()
                    .map_err(|e| NormalizeError::xml(position, e.to_string()))?
                {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = reference
                            .decode()
                            .map_err(|e| NormalizeError::xml(position, e.to_string()))?;
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| {
                                NormalizeError::xml(position, format!("unknown entity &{name};"))
                            })?
                            .to_string()
                    }
                };
                push_text(&mut stack, &resolved, position)?;
            }
            Event::CData(cdata) => {
                let content = String::from_utf8(cdata.into_inner().into_owned())
                    .map_err(|e| NormalizeError::xml(position, e.to_string()))?;
                push_misc(XmlNode::CData(content), &mut stack, &root, &mut prolog, &mut epilog, position)?;
            }
            Event::Comment(comment) => {
                let content = comment
                    .decode()
                    .map_err(|e| NormalizeError::xml(position, e.to_string()))?
                    .into_owned();
                push_misc(XmlNode::Comment(content), &mut stack, &root, &mut prolog, &mut epilog, position)?;
            }
            Event::PI(pi) => {
                let content = std::str::from_utf8(&pi)
                    .map_err(|e| NormalizeError::xml(position, e.to_string()))?
                    .to_string();
                push_misc(
                    XmlNode::ProcessingInstruction(content),
                    &mut stack,
                    &root,
                    &mut prolog,
                    &mut epilog,
                    position,
                )?;
            }
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(NormalizeError::xml(
            reader.buffer_position(),
            "unclosed element at end of input",
        ));
    }
    let root = root.ok_or_else(|| NormalizeError::xml(0, "document has no root element"))?;
    Ok(XmlDocument {
        prolog,
        root,
        epilog,
    })
}

fn element_from_start(
    reader: &Reader<&[u8]>,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| NormalizeError::xml(position, e.to_string()))?
        .to_string();
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| NormalizeError::xml(position, e.to_string()))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| NormalizeError::xml(position, e.to_string()))?
            .to_string();
        let value = attribute
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| NormalizeError::xml(position, e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach_element(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    position: u64,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(NormalizeError::xml(position, "multiple root elements")),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str, position: u64) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
                existing.push_str(text);
            } else {
                parent.children.push(XmlNode::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(NormalizeError::xml(position, "text outside the root element")),
    }
}

fn push_misc(
    node: XmlNode,
    stack: &mut [XmlElement],
    root: &Option<XmlElement>,
    prolog: &mut Vec<XmlNode>,
    epilog: &mut Vec<XmlNode>,
    position: u64,
) -> Result<()> {
    match (stack.last_mut(), root) {
        (Some(parent), _) => parent.children.push(node),
        (None, _) if matches!(node, XmlNode::CData(_)) => {
            return Err(NormalizeError::xml(position, "CDATA outside the root element"));
        }
        (None, None) => prolog.push(node),
        (None, Some(_)) => epilog.push(node),
    }
    Ok(())
}

/// Return the canonical form of `doc`.
pub fn normalize_xml(doc: &XmlDocument) -> XmlDocument {
    XmlDocument {
        prolog: doc.prolog.clone(),
        root: normalize_element(&doc.root),
        epilog: doc.epilog.clone(),
    }
}

fn normalize_element(element: &XmlElement) -> XmlElement {
    let mut attributes = element.attributes.clone();
    attributes.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut children: Vec<XmlNode> = Vec::with_capacity(element.children.len());
    for child in &element.children {
        match child {
            XmlNode::Text(text) if text.trim().is_empty() => {}
            XmlNode::Text(text) => {
                if let Some(XmlNode::Text(existing)) = children.last_mut() {
                    existing.push_str(text);
                } else {
                    children.push(XmlNode::Text(text.clone()));
                }
            }
            XmlNode::Element(inner) => children.push(XmlNode::Element(normalize_element(inner))),
            other => children.push(other.clone()),
        }
    }

    XmlElement {
        name: element.name.clone(),
        attributes,
        children,
    }
}

/// Render the canonical, indented text of `doc`.
pub fn render_xml(doc: &XmlDocument) -> Result<String> {
    let writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut text = render_with(writer, &normalize_xml(doc))?;
    text.push('\n');
    Ok(text)
}

/// Render the canonical text of `doc` without indentation.
pub fn render_xml_compact(doc: &XmlDocument) -> Result<String> {
    render_with(Writer::new(Vec::new()), &normalize_xml(doc))
}

fn render_with(mut writer: Writer<Vec<u8>>, doc: &XmlDocument) -> Result<String> {
    write_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;
    for node in &doc.prolog {
        write_node(&mut writer, node)?;
    }
    write_element(&mut writer, &doc.root)?;
    for node in &doc.epilog {
        write_node(&mut writer, node)?;
    }
    String::from_utf8(writer.into_inner()).map_err(|e| NormalizeError::xml(0, e.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        let value = escape_attribute(value);
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }
    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }
    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

/// Escape an attribute value. Tabs and line breaks become character
/// references, since a reader normalizes literal ones to spaces.
fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in escape(value).chars() {
        match ch {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            other => out.push(other),
        }
    }
    out
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(element) => write_element(writer, element),
        XmlNode::Text(text) => write_event(writer, Event::Text(BytesText::new(text))),
        XmlNode::CData(text) => write_event(writer, Event::CData(BytesCData::new(text.as_str()))),
        XmlNode::Comment(text) => {
            write_event(writer, Event::Comment(BytesText::from_escaped(text.as_str())))
        }
        XmlNode::ProcessingInstruction(text) => {
            write_event(writer, Event::PI(BytesPI::new(text.as_str())))
        }
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| NormalizeError::xml(0, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_entities_and_sorts_attributes() {
        let doc = parse_xml(r#"<a z="1" b="x &amp; y"><t>1 &lt; 2 &#65;</t></a>"#).unwrap();
        let normalized = normalize_xml(&doc);
        assert_eq!(
            normalized.root.attributes,
            vec![
                ("b".to_string(), "x & y".to_string()),
                ("z".to_string(), "1".to_string())
            ]
        );
        let XmlNode::Element(t) = &normalized.root.children[0] else {
            panic!("expected element");
        };
        assert_eq!(t.children, vec![XmlNode::Text("1 < 2 A".to_string())]);
    }

    #[test]
    fn drops_indentation_whitespace() {
        let doc = parse_xml("<a>\n    <b/>\n    <c>x</c>\n</a>").unwrap();
        let normalized = normalize_xml(&doc);
        assert_eq!(normalized.root.children.len(), 2);
    }

    #[test]
    fn renders_indented_with_declaration() {
        let doc = parse_xml(r#"<?xml version="1.0" encoding="utf-16"?><a q="2" p="1"><b>t</b><c/></a>"#)
            .unwrap();
        let text = render_xml(&doc).unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<a p=\"1\" q=\"2\">\n  <b>t</b>\n  <c/>\n</a>\n"
        );
    }

    #[test]
    fn attribute_line_breaks_stay_escaped() {
        let doc = parse_xml("<a v=\"x&#10;y&#9;z&#13;\" w=\"&quot;q&quot;\"/>").unwrap();
        assert_eq!(doc.root.attributes[0].1, "x\ny\tz\r");

        let text = render_xml_compact(&doc).unwrap();
        assert!(text.contains(r#"v="x&#10;y&#9;z&#13;""#), "{text}");
        assert!(text.contains(r#"w="&quot;q&quot;""#), "{text}");
        assert_eq!(parse_xml(&text).unwrap().root, doc.root);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_xml("<a><b></a>").is_err());
        assert!(parse_xml("<a/><b/>").is_err());
        assert!(parse_xml("just text").is_err());
        assert!(parse_xml("<a>&bogus;</a>").is_err());
    }

    #[test]
    fn keeps_comments_and_cdata() {
        let doc = parse_xml("<!-- head --><a><![CDATA[<raw>]]><!-- inner --></a>").unwrap();
        assert_eq!(doc.prolog, vec![XmlNode::Comment(" head ".to_string())]);
        assert_eq!(
            doc.root.children,
            vec![
                XmlNode::CData("<raw>".to_string()),
                XmlNode::Comment(" inner ".to_string())
            ]
        );
        let text = render_xml(&doc).unwrap();
        let reparsed = normalize_xml(&parse_xml(&text).unwrap());
        assert_eq!(reparsed, normalize_xml(&doc));
    }
}
