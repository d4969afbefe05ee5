//! XML document handling
//!
//! This module provides a small owned element tree for EUDAMED documents:
//! parsing with prefix resolution, lookup and modification of descendants by
//! qualified path, and writing with quick-xml.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::namespaces::{NamespaceContext, QName};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;

/// An attribute as written in the source, e.g. `xsi:type="device:MDRDeviceType"`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name including its prefix
    pub name: String,
    /// Unescaped attribute value
    pub value: String,
}

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Prefix used when writing the element (None writes the bare local name)
    pub prefix: Option<String>,
    /// Element attributes in document order, namespace declarations excluded
    pub attributes: Vec<Attribute>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace declarations made on this element
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            prefix: None,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Set the prefix used when writing
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// The name as written: `prefix:local` or `local`
    pub fn prefixed_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.qname.local_name),
            None => self.qname.local_name.clone(),
        }
    }

    /// Get an attribute value by its written name or by its local part
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|a| a.name.rsplit(':').next() == Some(name))
            })
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing one of the same name
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Set text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Find the first child with the given qualified name
    pub fn find_child(&self, qname: &QName) -> Option<&Element> {
        self.children.iter().find(|e| &e.qname == qname)
    }

    /// Find the first descendant matching `steps`.
    ///
    /// The first step may match at any depth below this element, each following
    /// step must be a direct child of the previous match. Matches are tried in
    /// document order.
    pub fn find_path(&self, steps: &[QName]) -> Option<&Element> {
        let route = self.route_to(steps)?;
        let mut current = self;
        for index in route {
            current = &current.children[index];
        }
        Some(current)
    }

    /// Mutable variant of [`find_path`](Self::find_path)
    pub fn find_path_mut(&mut self, steps: &[QName]) -> Option<&mut Element> {
        let route = self.route_to(steps)?;
        let mut current = self;
        for index in route {
            current = &mut current.children[index];
        }
        Some(current)
    }

    /// Child indices leading from this element to the first match of `steps`
    fn route_to(&self, steps: &[QName]) -> Option<Vec<usize>> {
        let (first, rest) = steps.split_first()?;
        let mut route = Vec::new();
        if self.search_descendants(first, rest, &mut route) {
            Some(route)
        } else {
            None
        }
    }

    fn search_descendants(&self, first: &QName, rest: &[QName], route: &mut Vec<usize>) -> bool {
        for (index, child) in self.children.iter().enumerate() {
            route.push(index);
            if &child.qname == first && child.follow_children(rest, route) {
                return true;
            }
            if child.search_descendants(first, rest, route) {
                return true;
            }
            route.pop();
        }
        false
    }

    fn follow_children(&self, steps: &[QName], route: &mut Vec<usize>) -> bool {
        let Some((step, rest)) = steps.split_first() else {
            return true;
        };
        for (index, child) in self.children.iter().enumerate() {
            if &child.qname == step {
                route.push(index);
                if child.follow_children(rest, route) {
                    return true;
                }
                route.pop();
            }
        }
        false
    }

    /// Text of the first descendant matching `steps`, trimmed
    pub fn find_text(&self, steps: &[QName]) -> Option<&str> {
        self.find_path(steps)
            .and_then(|e| e.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Replace the text of the first descendant matching `steps`.
    ///
    /// Returns `false` when no such descendant exists.
    pub fn replace_text(&mut self, steps: &[QName], text: impl Into<String>) -> bool {
        match self.find_path_mut(steps) {
            Some(element) => {
                element.text = Some(text.into());
                true
            }
            None => false,
        }
    }

    /// Descendants with the given name, in document order
    pub fn descendants_named(&self, qname: &QName) -> Vec<&Element> {
        let mut found = Vec::new();
        for child in &self.children {
            if &child.qname == qname {
                found.push(child);
            }
            found.extend(child.descendants_named(qname));
        }
        found
    }

    /// Visit this element and every descendant in document order
    pub fn visit_mut(&mut self, visitor: &mut dyn FnMut(&mut Element)) {
        visitor(self);
        for child in &mut self.children {
            child.visit_mut(visitor);
        }
    }

    /// Write this element and its subtree
    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let name = self.prefixed_name();
        let mut start = BytesStart::new(name.as_str());

        if let Some(ns) = self.namespaces.get_default_namespace() {
            start.push_attribute(("xmlns", ns));
        }
        for (prefix, uri) in self.namespaces.iter() {
            let key = format!("xmlns:{}", prefix);
            start.push_attribute((key.as_str(), uri));
        }
        for attr in &self.attributes {
            start.push_attribute((attr.name.as_str(), attr.value.as_str()));
        }

        let text = self.text.as_deref().filter(|t| !t.is_empty());
        if text.is_none() && self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        Ok(())
    }

    /// Serialize this element as an XML fragment without declaration
    pub fn to_xml_fragment(&self, options: &WriteOptions) -> Result<String> {
        let mut writer = options.writer();
        self.write(&mut writer)?;
        bytes_to_string(writer.into_inner())
    }
}

/// Output formatting options
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Indentation width in spaces (0 writes compact output)
    pub indent: usize,
    /// Emit the `<?xml ...?>` declaration
    pub declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            declaration: true,
        }
    }
}

impl WriteOptions {
    /// Compact output without declaration
    pub fn compact() -> Self {
        Self {
            indent: 0,
            declaration: false,
        }
    }

    fn writer(&self) -> Writer<Vec<u8>> {
        if self.indent > 0 {
            Writer::new_with_indent(Vec::new(), b' ', self.indent)
        } else {
            Writer::new(Vec::new())
        }
    }
}

fn bytes_to_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::Xml(format!("Output is not UTF-8: {}", e)))
}

/// XML Document representation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document around a root element
    pub fn with_root(root: Element) -> Self {
        Self { root: Some(root) }
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Load and parse an XML document from a file
    pub fn from_file(path: &Path, limits: &Limits) -> Result<Self> {
        let xml = Loader::new().with_limits(limits.clone()).load(path)?;
        Self::from_string(&xml)
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = Self::parse_element(&e, &element_stack)?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e, &element_stack)?;
                    if let Some(parent) = element_stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?
                            .to_string();
                        if !text.trim().is_empty() {
                            current.set_text(text);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = String::from_utf8(e.into_inner().into_owned())
                            .map_err(|e| Error::Xml(format!("Invalid CDATA: {}", e)))?;
                        current.set_text(text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if !element_stack.is_empty() {
            return Err(Error::Xml("Unexpected end of document".to_string()));
        }
        if doc.root.is_none() {
            return Err(Error::Xml("Document has no root element".to_string()));
        }
        Ok(doc)
    }

    /// Parse an element start tag, resolving its prefix against the open scopes
    fn parse_element(start: &BytesStart, open: &[Element]) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut namespaces = NamespaceContext::new();
        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
                .to_string();

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            if attr_name == "xmlns" {
                namespaces.set_default_namespace(attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                namespaces.add_prefix(prefix, attr_value);
            } else {
                attributes.push(Attribute {
                    name: attr_name,
                    value: attr_value,
                });
            }
        }

        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
            None => (None, name),
        };
        let namespace = resolve_prefix(prefix.as_deref(), &namespaces, open)?;

        Ok(Element {
            qname: QName::new(namespace, local),
            prefix,
            attributes,
            text: None,
            children: Vec::new(),
            namespaces,
        })
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Get the root element mutably
    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.root.as_mut()
    }

    /// Serialize the document
    pub fn to_xml_string(&self, options: &WriteOptions) -> Result<String> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::Xml("Document has no root element".to_string()))?;

        let mut writer = options.writer();
        if options.declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        root.write(&mut writer)?;

        let mut xml = bytes_to_string(writer.into_inner())?;
        if options.indent > 0 {
            xml.push('\n');
        }
        Ok(xml)
    }

    /// Serialize the document to a new file
    pub fn write_to_file(&self, path: &Path, options: &WriteOptions) -> Result<()> {
        let xml = self.to_xml_string(options)?;
        Loader::new().write(path, &xml)?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Resolve an element prefix against its own declarations, then the open ancestors
fn resolve_prefix(
    prefix: Option<&str>,
    own: &NamespaceContext,
    open: &[Element],
) -> Result<Option<String>> {
    let scopes = std::iter::once(own).chain(open.iter().rev().map(|e| &e.namespaces));
    match prefix {
        Some("xml") => Ok(Some("http://www.w3.org/XML/1998/namespace".to_string())),
        Some(prefix) => {
            for scope in scopes {
                if let Some(ns) = scope.get_namespace(prefix) {
                    return Ok(Some(ns.to_string()));
                }
            }
            Err(Error::Namespace(format!("Unknown prefix: {}", prefix)))
        }
        None => {
            for scope in scopes {
                if let Some(ns) = scope.get_default_namespace() {
                    return Ok(if ns.is_empty() {
                        None
                    } else {
                        Some(ns.to_string())
                    });
                }
            }
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::eudamed;
    use pretty_assertions::assert_eq;

    const DEVICE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<m:Push xmlns:m="https://ec.europa.eu/tools/eudamed/dtx/servicemodel/Message/v1">
  <m:messageID>old</m:messageID>
  <m:payload>
    <device:Device xmlns:device="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/v1"
        xmlns:basicudi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1"
        xmlns:commondi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xsi:type="device:MDRDeviceType">
      <device:MDRBasicUDI>
        <basicudi:identifier><commondi:DICode>599302877PAYU9</commondi:DICode></basicudi:identifier>
        <basicudi:model>Model &amp; Co</basicudi:model>
      </device:MDRBasicUDI>
    </device:Device>
  </m:payload>
</m:Push>"#;

    fn basic_udi_code_path() -> Vec<QName> {
        vec![
            QName::namespaced(eudamed::DEVICE, "MDRBasicUDI"),
            QName::namespaced(eudamed::BASIC_UDI, "identifier"),
            QName::namespaced(eudamed::COMMON_DI, "DICode"),
        ]
    }

    #[test]
    fn test_document_creation() {
        let doc = Document::new();
        assert!(doc.root.is_none());
        assert!(doc.to_xml_string(&WriteOptions::default()).is_err());
    }

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<root><child>text</child></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "child");
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_parse_with_attributes() {
        let xml = r#"<root attr1="value1" attr2="value2"><child/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.get_attribute("attr1"), Some("value1"));
        assert_eq!(root.get_attribute("attr2"), Some("value2"));
    }

    #[test]
    fn test_parse_resolves_prefixes() {
        let doc = Document::from_string(DEVICE_XML).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(root.namespace(), Some(eudamed::MESSAGE));
        assert_eq!(root.prefix.as_deref(), Some("m"));

        let device = &root.children[1].children[0];
        assert_eq!(device.namespace(), Some(eudamed::DEVICE));
        assert_eq!(device.get_attribute("xsi:type"), Some("device:MDRDeviceType"));
        assert_eq!(device.get_attribute("type"), Some("device:MDRDeviceType"));
    }

    #[test]
    fn test_parse_unknown_prefix_fails() {
        let result = Document::from_string("<a:root/>");
        assert!(matches!(result, Err(Error::Namespace(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Document::from_string("").is_err());
        assert!(Document::from_string("<root><child></root>").is_err());
    }

    #[test]
    fn test_find_path_descends_from_any_depth() {
        let doc = Document::from_string(DEVICE_XML).unwrap();
        let root = doc.root().unwrap();

        assert_eq!(root.find_text(&basic_udi_code_path()), Some("599302877PAYU9"));
        let model = [
            QName::namespaced(eudamed::DEVICE, "MDRBasicUDI"),
            QName::namespaced(eudamed::BASIC_UDI, "model"),
        ];
        assert_eq!(root.find_text(&model), Some("Model & Co"));
        assert!(root
            .find_path(&[QName::namespaced(eudamed::UDI_DI, "identifier")])
            .is_none());
    }

    #[test]
    fn test_replace_text_and_write() {
        let mut doc = Document::from_string(DEVICE_XML).unwrap();
        let root = doc.root_mut().unwrap();
        assert!(root.replace_text(&basic_udi_code_path(), "599302677TAYU3"));
        assert!(!root.replace_text(&[QName::local("missing")], "x"));

        let xml = doc.to_xml_string(&WriteOptions::default()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<commondi:DICode>599302677TAYU3</commondi:DICode>"));
        assert!(xml.contains("<basicudi:model>Model &amp; Co</basicudi:model>"));
        assert!(xml.contains("xsi:type=\"device:MDRDeviceType\""));

        let reparsed = Document::from_string(&xml).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_compact_fragment() {
        let root = Element::new(QName::local("Root"))
            .with_child(Element::new(QName::local("Code")).with_text("A"))
            .with_child(Element::new(QName::local("Empty")));
        let xml = root.to_xml_fragment(&WriteOptions::compact()).unwrap();
        assert_eq!(xml, "<Root><Code>A</Code><Empty/></Root>");
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut elem = Element::new(QName::local("test"));
        elem.set_attribute("xsi:type", "A");
        elem.set_attribute("xsi:type", "B");
        assert_eq!(elem.attributes.len(), 1);
        assert_eq!(elem.get_attribute("xsi:type"), Some("B"));
    }

    #[test]
    fn test_find_children() {
        let xml = r#"<root><child1/><child2/><child1/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.find_children("child1").len(), 2);
        assert!(root.find_child(&QName::local("child2")).is_some());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        let doc = Document::with_root(Element::new(QName::local("Root")).with_text("x"));
        doc.write_to_file(&path, &WriteOptions::default()).unwrap();

        let loaded = Document::from_file(&path, &Limits::default()).unwrap();
        assert_eq!(loaded, doc);
    }
}
