//! Decoded structured documents.

use serde_json::Value;

/// Serialization family of a structured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Json,
    Xml,
}

impl DocumentKind {
    /// File extension used in the project tree, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Json => "json",
            DocumentKind::Xml => "xml",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentKind::Json => "application/json",
            DocumentKind::Xml => "application/xml",
        }
    }
}

/// A structured document owned by a [`crate::LogicalModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Json(Value),
    Xml(XmlDocument),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Json(_) => DocumentKind::Json,
            Document::Xml(_) => DocumentKind::Xml,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Document::Json(value) => Some(value),
            Document::Xml(_) => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            Document::Json(value) => Some(value),
            Document::Xml(_) => None,
        }
    }
}

/// An XML document: misc nodes around a single root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// Comments and processing instructions before the root element.
    pub prolog: Vec<XmlNode>,
    pub root: XmlElement,
    /// Comments and processing instructions after the root element.
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name, prefix included.
    pub name: String,
    /// Unescaped attribute values in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
    CData(String),
    Comment(String),
    /// Raw processing instruction content between `<?` and `?>`.
    ProcessingInstruction(String),
}
