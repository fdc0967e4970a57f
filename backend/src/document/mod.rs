//! Output document tree and XML serialization.
//!
//! The tree is built once per input, serialized with `quick-xml`, then
//! dropped. Children and attributes keep insertion order so identical
//! inputs always produce identical bytes.

use std::borrow::Cow;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;

use crate::error::{SerializationError, SerializationResult};

/// Whether `name` can be used as an element or attribute name.
///
/// Accepts ASCII names only: a letter or `_`, then letters, digits, `_`,
/// `-` or `.`. Colons are rejected since the output uses no namespaces.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Whether `c` may appear in XML 1.0 character data.
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// Drop characters XML 1.0 cannot carry, even escaped.
pub fn strip_invalid_chars(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

/// One element of the output document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct XmlElement {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Leaf element carrying text.
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// First child with this name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with this name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a `/`-separated path of first-match children.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, name| node.child(name))
    }

    /// Text of the element at `path`.
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(|e| e.text.as_deref())
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn write<W: Write>(&self, xml: &mut Writer<W>) -> SerializationResult<()> {
        if !is_xml_name(&self.name) {
            return Err(SerializationError::InvalidName(self.name.clone()));
        }
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            if !is_xml_name(key) {
                return Err(SerializationError::InvalidName(key.clone()));
            }
            start.push_attribute((key.as_str(), strip_invalid_chars(value).as_ref()));
        }

        let text = strip_invalid_chars(self.text.as_deref().unwrap_or(""));
        if self.children.is_empty() && text.is_empty() {
            xml.write_event(Event::Empty(start))?;
            return Ok(());
        }

        xml.write_event(Event::Start(start))?;
        if !text.is_empty() {
            xml.write_event(Event::Text(BytesText::new(&text)))?;
        }
        for child in &self.children {
            child.write(xml)?;
        }
        xml.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// A complete output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDocument {
    pub root: XmlElement,
}

impl OutputDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Write the declaration and the tree, indented two spaces per level,
    /// followed by a trailing newline.
    pub fn write_to<W: Write>(&self, writer: W) -> SerializationResult<()> {
        let mut xml = Writer::new_with_indent(writer, b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.root.write(&mut xml)?;
        xml.into_inner().write_all(b"\n")?;
        Ok(())
    }

    pub fn to_bytes(&self) -> SerializationResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn to_xml_string(&self) -> SerializationResult<String> {
        Ok(String::from_utf8(self.to_bytes()?)?)
    }
}
