//! Subtree filter trees
//!
//! A filter is parsed from one or more `<filter>` fragments into a tree of
//! [`FilterNode`]s, folded into a single canonical tree with
//! [`build_merged_filter`], and then read-only for the rest of the request.
//!
//! ```text
//! <library>                      FilterNode library
//!   <artist>                       └─ FilterNode artist
//!     <name>Lenny</name>                ├─ match  name = Lenny
//!     <album/>                          └─ select album
//!   </artist>
//! </library>
//! ```
//!
//! Children are owned by their parent. Nothing points back up: code that needs
//! the ancestry of a node (the state walker, the subtree selector) carries it
//! down as a `NodeId` / `SchemaPath` while descending.

pub mod apply;
pub mod merge;
pub mod parse;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::xml::{Element, QName};

pub use apply::apply_filter;
pub use merge::node_id_to_filter;
pub use parse::{build_merged_filter, filter_to_xml, parse};

/// Content-match leaf: selects instances whose leaf carries this value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterMatchNode {
    pub node_name: String,
    pub namespace: String,
    pub value: String,
}

impl FilterMatchNode {
    pub fn new(
        namespace: impl Into<String>,
        node_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            namespace: namespace.into(),
            value: value.into(),
        }
    }

    pub fn qname(&self) -> QName {
        QName::new(self.namespace.clone(), self.node_name.clone())
    }

    fn key(&self) -> (&str, &str, &str) {
        (&self.namespace, &self.node_name, &self.value)
    }
}

/// One level of a subtree filter
///
/// Equality ignores the order of match, select and child nodes as well as
/// the captured prefix declarations.
#[derive(Debug, Clone, Default)]
pub struct FilterNode {
    node_name: String,
    namespace: String,
    attributes: BTreeMap<String, String>,
    match_nodes: Vec<FilterMatchNode>,
    select_nodes: Vec<FilterNode>,
    child_nodes: Vec<FilterNode>,
}

impl FilterNode {
    pub fn new(namespace: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// The nameless node that holds the top-level filter elements
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.node_name.is_empty() && self.namespace.is_empty()
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn qname(&self) -> QName {
        QName::new(self.namespace.clone(), self.node_name.clone())
    }

    /// Prefix declarations captured from the source, `xmlns:p` → URI
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn match_nodes(&self) -> &[FilterMatchNode] {
        &self.match_nodes
    }

    pub fn select_nodes(&self) -> &[FilterNode] {
        &self.select_nodes
    }

    pub fn child_nodes(&self) -> &[FilterNode] {
        &self.child_nodes
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Add a content-match leaf; an identical one is only kept once
    pub fn add_match_node(&mut self, match_node: FilterMatchNode) {
        if !self.match_nodes.contains(&match_node) {
            self.match_nodes.push(match_node);
        }
    }

    /// Builder form of [`FilterNode::add_match_node`]
    pub fn with_match(
        mut self,
        namespace: &str,
        node_name: &str,
        value: impl Into<String>,
    ) -> Self {
        self.add_match_node(FilterMatchNode::new(namespace, node_name, value));
        self
    }

    /// Builder form of [`FilterNode::add_select_node`]
    pub fn with_select(mut self, namespace: &str, node_name: &str) -> Self {
        self.add_select_node(FilterNode::new(namespace, node_name));
        self
    }

    /// Builder form of [`FilterNode::add_or_merge_child`]
    pub fn with_child(mut self, child: FilterNode) -> Self {
        self.add_or_merge_child(child);
        self
    }

    /// True when nothing below this node narrows what is returned
    pub fn is_select_all(&self) -> bool {
        self.select_nodes.is_empty() && self.child_nodes.is_empty()
    }

    pub fn has_select_node(&self, qname: &QName) -> bool {
        self.select_nodes
            .iter()
            .any(|node| node.node_name == qname.local_name && node.namespace == qname.namespace)
    }

    pub fn has_match_node(&self, qname: &QName) -> bool {
        self.match_nodes
            .iter()
            .any(|node| node.node_name == qname.local_name && node.namespace == qname.namespace)
    }

    /// Child containment nodes of the given type
    pub fn children_of_type<'a>(&'a self, qname: &QName) -> impl Iterator<Item = &'a FilterNode> + 'a {
        let qname = qname.clone();
        self.child_nodes
            .iter()
            .filter(move |child| child.is_of_type(&qname))
    }

    pub fn is_of_type(&self, qname: &QName) -> bool {
        self.node_name == qname.local_name && self.namespace == qname.namespace
    }

    /// Schema-free instance check: same type and every match node satisfied
    pub fn matches_element(&self, element: &Element) -> bool {
        element.is(&self.namespace, &self.node_name)
            && self
                .match_nodes
                .iter()
                .all(|m| element.child_text(&m.qname()) == Some(m.value.trim()))
    }

    pub(crate) fn match_set(&self) -> BTreeSet<(&str, &str, &str)> {
        self.match_nodes.iter().map(FilterMatchNode::key).collect()
    }

    pub(crate) fn select_nodes_mut(&mut self) -> &mut Vec<FilterNode> {
        &mut self.select_nodes
    }

    pub(crate) fn child_nodes_mut(&mut self) -> &mut Vec<FilterNode> {
        &mut self.child_nodes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.attributes
    }
}

fn same_members<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len()
        && a.iter().all(|item| {
            a.iter().filter(|other| *other == item).count()
                == b.iter().filter(|other| *other == item).count()
        })
}

impl PartialEq for FilterNode {
    fn eq(&self, other: &Self) -> bool {
        self.node_name == other.node_name
            && self.namespace == other.namespace
            && same_members(&self.match_nodes, &other.match_nodes)
            && same_members(&self.select_nodes, &other.select_nodes)
            && same_members(&self.child_nodes, &other.child_nodes)
    }
}

impl Eq for FilterNode {}

// Coarser than equality on purpose: children are not hashed, so equal nodes
// always hash alike regardless of child order.
impl Hash for FilterNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node_name.hash(state);
        self.namespace.hash(state);
        for key in self.match_set() {
            key.hash(state);
        }
        self.select_nodes.len().hash(state);
        self.child_nodes.len().hash(state);
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        write!(f, "{{{}}}{}", self.namespace, self.node_name)?;
        for m in &self.match_nodes {
            write!(f, "[{}='{}']", m.node_name, m.value)?;
        }
        Ok(())
    }
}
