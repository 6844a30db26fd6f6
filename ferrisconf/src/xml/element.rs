//! Element tree with namespace resolution.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use super::path::{Namespaces, Step, parse_path};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// XML parse failure with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    pub message: String,
    pub position: usize,
}

impl XmlError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.position)
    }
}

impl std::error::Error for XmlError {}

/// An owned XML element.
///
/// Mixed content is not preserved: an element carries at most one text
/// value (whitespace-trimmed) plus its child elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    prefix: Option<String>,
    name: String,
    namespace: Option<String>,
    attributes: IndexMap<String, String>,
    text: Option<String>,
    children: Vec<Element>,
}

/// Namespace declarations made on one element: (prefix, uri).
type Scope = Vec<(Option<String>, String)>;

impl Element {
    /// Create an element without a namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an element in the given namespace.
    pub fn in_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Builder-style text setter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Vec<Scope> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| XmlError::new(e.to_string(), position))?;

            match event {
                Event::Start(start) => {
                    let (element, scope) = Self::open(&start, &scopes, position)?;
                    scopes.push(scope);
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let (element, _) = Self::open(&start, &scopes, position)?;
                    Self::attach(&mut stack, &mut root, element, position)?;
                }
                Event::End(_) => {
                    scopes.pop();
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::new("unexpected closing tag", position))?;
                    Self::attach(&mut stack, &mut root, element, position)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| XmlError::new(e.to_string(), position))?;
                    Self::append_text(&mut stack, &value, position)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    Self::append_text(&mut stack, &value, position)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::new(
                format!("unclosed element <{}>", open.qualified_name()),
                xml.len(),
            ));
        }

        root.ok_or_else(|| XmlError::new("document has no root element", xml.len()))
    }

    fn open(start: &BytesStart<'_>, scopes: &[Scope], position: usize) -> Result<(Element, Scope), XmlError> {
        let raw_name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| XmlError::new(e.to_string(), position))?
            .to_string();
        let (prefix, name) = match raw_name.split_once(':') {
            Some((p, l)) => (Some(p.to_string()), l.to_string()),
            None => (None, raw_name),
        };

        let mut attributes = IndexMap::new();
        let mut scope = Scope::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::new(e.to_string(), position))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| XmlError::new(e.to_string(), position))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::new(e.to_string(), position))?
                .into_owned();

            if key == "xmlns" {
                scope.push((None, value.clone()));
            } else if let Some(p) = key.strip_prefix("xmlns:") {
                scope.push((Some(p.to_string()), value.clone()));
            }
            attributes.insert(key, value);
        }

        let namespace = Self::resolve(prefix.as_deref(), &scope, scopes);
        if prefix.is_some() && namespace.is_none() {
            return Err(XmlError::new(
                format!("unbound prefix in <{}:{}>", prefix.unwrap_or_default(), name),
                position,
            ));
        }

        Ok((
            Element {
                prefix,
                name,
                namespace,
                attributes,
                text: None,
                children: Vec::new(),
            },
            scope,
        ))
    }

    fn resolve(prefix: Option<&str>, own: &Scope, outer: &[Scope]) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NS.to_string());
        }
        std::iter::once(own)
            .chain(outer.iter().rev())
            .flat_map(|scope| scope.iter())
            .find(|(p, _)| p.as_deref() == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then(|| uri.clone()))
    }

    fn attach(
        stack: &mut [Element],
        root: &mut Option<Element>,
        element: Element,
        position: usize,
    ) -> Result<(), XmlError> {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(element);
        } else if root.is_none() {
            *root = Some(element);
        } else {
            return Err(XmlError::new("multiple root elements", position));
        }
        Ok(())
    }

    fn append_text(stack: &mut [Element], value: &str, position: usize) -> Result<(), XmlError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        match stack.last_mut() {
            Some(current) => {
                match &mut current.text {
                    Some(existing) => existing.push_str(trimmed),
                    None => current.text = Some(trimmed.to_string()),
                }
                Ok(())
            }
            None => Err(XmlError::new("text outside the root element", position)),
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Local name (without prefix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix the element was written with, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// `prefix:name` or `name`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.name),
            None => self.name.clone(),
        }
    }

    /// Resolved namespace URI.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Attribute by exact key (`nc:operation`, `xmlns`, ...).
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attribute by local part of its key, ignoring any prefix.
    pub fn attribute_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.rsplit(':').next() == Some(local) && !k.starts_with("xmlns"))
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    /// True when the element has no child elements.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn clear_text(&mut self) {
        self.text = None;
    }

    /// Rename the element, keeping prefix and namespace.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.shift_remove(key)
    }

    /// Append a child and return a reference to it.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Return the first child named `name` in `namespace`, creating it if absent.
    pub fn ensure_child(&mut self, namespace: &str, name: &str) -> &mut Element {
        let position = self
            .children
            .iter()
            .position(|c| c.name == name && c.namespace.as_deref() == Some(namespace));
        match position {
            Some(i) => &mut self.children[i],
            None => self.push(Element::in_namespace(namespace, name)),
        }
    }

    /// Keep only the children for which `keep` returns true.
    pub fn retain_children(&mut self, keep: impl FnMut(&Element) -> bool) {
        self.children.retain(keep);
    }

    /// Remove every namespace from the tree: prefixes, resolved URIs,
    /// `xmlns` declarations and attribute prefixes.
    pub fn strip_namespaces(&mut self) {
        self.prefix = None;
        self.namespace = None;
        let attributes = std::mem::take(&mut self.attributes);
        self.attributes = attributes
            .into_iter()
            .filter(|(k, _)| k != "xmlns" && !k.starts_with("xmlns:"))
            .map(|(k, v)| match k.split_once(':') {
                Some((_, local)) => (local.to_string(), v),
                None => (k, v),
            })
            .collect();
        for child in &mut self.children {
            child.strip_namespaces();
        }
    }

    /// Put every unprefixed, namespace-less element of the tree into `namespace`.
    pub fn adopt_namespace(&mut self, namespace: &str) {
        if self.prefix.is_none() && self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        for child in &mut self.children {
            child.adopt_namespace(namespace);
        }
    }

    /// Consuming variant of [`strip_namespaces`](Self::strip_namespaces).
    pub fn stripped(mut self) -> Self {
        self.strip_namespaces();
        self
    }

    // ---------------------------------------------------------------------
    // Path lookup
    // ---------------------------------------------------------------------

    /// First descendant matching `path` (relative to this element).
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_ns(path, &Namespaces::EMPTY)
    }

    /// First descendant matching a namespace-qualified `path`.
    pub fn find_ns(&self, path: &str, namespaces: &Namespaces) -> Option<&Element> {
        let steps = parse_path(path, namespaces)?;
        let mut current = self;
        for step in &steps {
            current = current.children.iter().find(|c| c.matches(step))?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        self.find_ns_mut(path, &Namespaces::EMPTY)
    }

    pub fn find_ns_mut(&mut self, path: &str, namespaces: &Namespaces) -> Option<&mut Element> {
        let steps = parse_path(path, namespaces)?;
        let mut current = self;
        for step in &steps {
            current = current.children.iter_mut().find(|c| c.matches(step))?;
        }
        Some(current)
    }

    /// Every descendant matching `path`.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        self.find_all_ns(path, &Namespaces::EMPTY)
    }

    pub fn find_all_ns(&self, path: &str, namespaces: &Namespaces) -> Vec<&Element> {
        let Some(steps) = parse_path(path, namespaces) else {
            return Vec::new();
        };
        let mut level: Vec<&Element> = vec![self];
        for step in &steps {
            level = level
                .into_iter()
                .flat_map(move |e| e.children.iter().filter(move |c| c.matches(step)))
                .collect();
        }
        level
    }

    /// Text of the first descendant matching `path`.
    pub fn find_text(&self, path: &str) -> Option<&str> {
        self.find(path).and_then(Element::text)
    }

    pub fn find_text_ns(&self, path: &str, namespaces: &Namespaces) -> Option<&str> {
        self.find_ns(path, namespaces).and_then(Element::text)
    }

    fn matches(&self, step: &Step<'_>) -> bool {
        step.matches(self.namespace.as_deref(), &self.name)
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    /// Serialize to a compact XML string.
    ///
    /// Output is deterministic: attributes keep insertion order. An
    /// unprefixed element whose namespace differs from the inherited default
    /// gets its own `xmlns` declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, None);
        out
    }

    fn write(&self, out: &mut String, inherited_default: Option<&str>) {
        out.push('<');
        out.push_str(&self.qualified_name());

        let declared = self.attributes.get("xmlns");
        if self.prefix.is_none() && declared.is_none() && self.namespace.as_deref() != inherited_default {
            out.push_str(" xmlns=\"");
            out.push_str(&escape(self.namespace.as_deref().unwrap_or_default()));
            out.push('"');
        }

        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        if let Some(text) = &self.text {
            out.push_str(&escape(text.as_str()));
        }

        let child_default = match declared {
            Some(uri) => (!uri.is_empty()).then_some(uri.as_str()),
            None if self.prefix.is_none() => self.namespace.as_deref(),
            None => inherited_default,
        };
        for child in &self.children {
            child.write(out, child_default);
        }

        out.push_str("</");
        out.push_str(&self.qualified_name());
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

impl FromStr for Element {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Element::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-native";
    const OSPF: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-ospf";
    const NS: Namespaces = Namespaces(&[("ios", NATIVE), ("ospf", OSPF)]);

    const DOC: &str = r#"<?xml version="1.0"?>
        <native xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-native">
          <hostname>R1</hostname>
          <router>
            <router-ospf xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-ospf">
              <ospf><process-id><id>1</id></process-id></ospf>
            </router-ospf>
          </router>
        </native>"#;

    #[test]
    fn test_parse_resolves_default_namespaces() {
        let root = Element::parse(DOC).unwrap();
        assert_eq!(root.name(), "native");
        assert_eq!(root.namespace(), Some(NATIVE));

        let ospf = root.find_ns("ios:router/ospf:router-ospf/ospf:ospf", &NS).unwrap();
        assert_eq!(ospf.namespace(), Some(OSPF));
        assert_eq!(root.find_text_ns("ios:hostname", &NS), Some("R1"));

        // Unqualified lookups do not match namespaced elements
        assert!(root.find("hostname").is_none());
        assert_eq!(root.find_text("*:hostname"), Some("R1"));
    }

    #[test]
    fn test_prefixed_elements_and_attributes() {
        let xml = r#"<a:root xmlns:a="urn:a" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0">
            <a:item nc:operation="delete">x</a:item></a:root>"#;
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.prefix(), Some("a"));
        let item = root.find("{urn:a}item").unwrap();
        assert_eq!(item.attribute("nc:operation"), Some("delete"));
        assert_eq!(item.attribute_local("operation"), Some("delete"));
    }

    #[test]
    fn test_unbound_prefix_is_error() {
        let err = Element::parse("<x:root/>").unwrap_err();
        assert!(err.message.contains("unbound prefix"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("<a>").is_err());
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_strip_namespaces() {
        let mut root = Element::parse(DOC).unwrap();
        root.strip_namespaces();
        assert!(root.attributes().is_empty());
        assert_eq!(root.find_text("router/router-ospf/ospf/process-id/id"), Some("1"));
        assert!(!root.to_xml().contains("xmlns"));
    }

    #[test]
    fn test_roundtrip_keeps_namespaces() {
        let root = Element::parse(DOC).unwrap();
        let again = Element::parse(&root.to_xml()).unwrap();
        assert_eq!(root, again);
    }

    #[test]
    fn test_serialize_declares_namespace_for_new_children() {
        let mut root = Element::in_namespace(NATIVE, "native");
        root.push(Element::in_namespace(NATIVE, "hostname").with_text("R1"));
        root.push(Element::in_namespace(OSPF, "router-ospf"));
        assert_eq!(
            root.to_xml(),
            format!(
                r#"<native xmlns="{NATIVE}"><hostname>R1</hostname><router-ospf xmlns="{OSPF}"/></native>"#
            )
        );
    }

    #[test]
    fn test_escaping() {
        let root = Element::new("d").with_text("a<b&c").with_attribute("k", "\"q\"");
        let xml = root.to_xml();
        assert!(xml.contains("a&lt;b&amp;c"));
        let parsed = Element::parse(&xml).unwrap();
        assert_eq!(parsed.text(), Some("a<b&c"));
        assert_eq!(parsed.attribute("k"), Some("\"q\""));
    }

    #[test]
    fn test_find_all_and_mutation() {
        let mut root = Element::parse("<l><i><n>1</n></i><i><n>2</n></i><j/></l>").unwrap();
        let names: Vec<_> = root.find_all("i/n").iter().filter_map(|e| e.text()).collect();
        assert_eq!(names, vec!["1", "2"]);

        root.find_mut("i/n").unwrap().set_text("9");
        assert_eq!(root.find_text("i/n"), Some("9"));

        root.retain_children(|c| c.name() != "j");
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn test_ensure_child() {
        let mut root = Element::in_namespace(NATIVE, "native");
        root.ensure_child(NATIVE, "router").set_text("a");
        root.ensure_child(NATIVE, "router").set_text("b");
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].text(), Some("b"));
    }
}
