//! Parsed XML element trees
//!
//! The core never touches wire bytes. Requests arrive as already-parsed
//! element trees and responses leave the same way. This module is the
//! minimal tree the rest of the crate works on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// NETCONF base namespace, owner of the `operation` attribute
pub const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Namespace-qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local_name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

/// One XML attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Namespace of the attribute, `None` for unqualified attributes
    pub namespace: Option<String>,
    /// Local name, or the full `xmlns:prefix` form for namespace declarations
    pub name: String,
    pub value: String,
}

impl Attribute {
    /// True for `xmlns` / `xmlns:prefix` declarations
    pub fn is_namespace_declaration(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// A parsed XML element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    /// Resolved namespace URI, `None` when the source left it unqualified
    pub namespace: Option<String>,
    /// Prefix as written in the source, kept for late namespace resolution
    pub prefix: Option<String>,
    pub attributes: Vec<Attribute>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    /// Create a qualified element
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            prefix: None,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Create an element with no namespace of its own
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            prefix: None,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Create a leaf carrying text
    pub fn leaf(
        namespace: impl Into<String>,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(namespace, name).with_text(text)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_attribute(
        mut self,
        namespace: Option<&str>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(Attribute {
            namespace: namespace.map(str::to_string),
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Qualified name; unqualified elements report an empty namespace
    pub fn qname(&self) -> QName {
        QName::new(self.namespace.clone().unwrap_or_default(), self.name.clone())
    }

    /// True when the element has the given namespace and local name
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref().unwrap_or("") == namespace
    }

    /// Trimmed text, `None` when absent or whitespace-only
    pub fn text_content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// A leaf is an element without element children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// First child with the given qualified name
    pub fn child(&self, qname: &QName) -> Option<&Element> {
        self.children
            .iter()
            .find(|child| child.is(&qname.namespace, &qname.local_name))
    }

    /// Text of the first child leaf with the given qualified name
    pub fn child_text(&self, qname: &QName) -> Option<&str> {
        self.child(qname).and_then(Element::text_content)
    }

    /// Value of an attribute by namespace and name
    pub fn attribute(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name && attr.namespace.as_deref() == namespace)
            .map(|attr| attr.value.as_str())
    }

    /// Drop an attribute in place
    pub fn remove_attribute(&mut self, namespace: Option<&str>, name: &str) {
        self.attributes
            .retain(|attr| !(attr.name == name && attr.namespace.as_deref() == namespace));
    }

    /// Limit the tree to `depth` levels, counting this element as level 1
    ///
    /// `depth == 0` means unbounded.
    pub fn prune_depth(&mut self, depth: u32) {
        if depth == 0 {
            return;
        }
        if depth == 1 {
            self.children.clear();
            return;
        }
        for child in &mut self.children {
            child.prune_depth(depth - 1);
        }
    }
}

fn escape(text: &str, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ch in text.chars() {
        match ch {
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '&' => out.write_str("&amp;")?,
            '"' => out.write_str("&quot;")?,
            other => write!(out, "{}", other)?,
        }
    }
    Ok(())
}

/// Compact single-line rendering used in diagnostics and test assertions
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        if let Some(ns) = &self.namespace {
            f.write_str(" xmlns=\"")?;
            escape(ns, f)?;
            f.write_str("\"")?;
        }
        for attr in &self.attributes {
            write!(f, " {}=\"", attr.name)?;
            escape(&attr.value, f)?;
            f.write_str("\"")?;
        }
        let text = self.text_content();
        if text.is_none() && self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        if let Some(text) = text {
            escape(text, f)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.name)
    }
}
