//! Schema lookup seam
//!
//! The compiled YANG schema lives outside this crate. The core only asks it a
//! handful of questions: prefixes, list keys, and whether a node is config,
//! state, or a leaf. [`StaticSchema`] answers them from explicitly registered
//! paths and is what tests and embedders without a schema registry use.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;
use crate::xml::QName;

/// Namespace ↔ prefix resolution
pub trait NamespaceContext: Send + Sync {
    /// Preferred prefix for a namespace URI
    fn prefix_for(&self, namespace: &str) -> Option<String>;

    /// Namespace URI bound to a prefix
    fn namespace_for(&self, prefix: &str) -> Option<String>;
}

/// Schema node path: the element names from the root, keys stripped
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaPath(Vec<QName>);

impl SchemaPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path whose steps all share one namespace
    pub fn of(namespace: &str, names: &[&str]) -> Self {
        Self(names.iter().map(|name| QName::new(namespace, *name)).collect())
    }

    /// Schema path of a data node: its container RDNs in order
    pub fn from_node_id(node_id: &NodeId) -> Self {
        Self(
            node_id
                .rdns()
                .iter()
                .filter(|rdn| rdn.is_container())
                .map(|rdn| QName::new(rdn.namespace.clone(), rdn.value.clone()))
                .collect(),
        )
    }

    pub fn child(&self, qname: QName) -> Self {
        let mut steps = self.0.clone();
        steps.push(qname);
        Self(steps)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<&QName> {
        self.0.last()
    }

    pub fn steps(&self) -> &[QName] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` equals `other` or is one of its ancestors
    pub fn is_prefix_of(&self, other: &SchemaPath) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

/// A state node directly below some config node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateChild {
    pub qname: QName,
    pub is_leaf: bool,
}

/// Questions the core asks the compiled schema
pub trait SchemaLookup: NamespaceContext {
    /// Key leaf names of the list at `path`; empty for containers and leaves
    fn list_keys(&self, path: &SchemaPath) -> Vec<QName>;

    /// Whether the node at `path` is configuration (as opposed to state)
    fn is_config(&self, path: &SchemaPath) -> bool;

    /// Whether the node at `path` is a leaf or leaf-list
    fn is_leaf(&self, path: &SchemaPath) -> bool;

    /// Top-most state nodes directly below `parent`
    fn state_children(&self, parent: &SchemaPath) -> Vec<StateChild>;
}

/// Explicitly registered schema facts
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    prefixes: BTreeMap<String, String>,
    lists: HashMap<SchemaPath, Vec<QName>>,
    leaves: BTreeSet<SchemaPath>,
    state_roots: BTreeSet<SchemaPath>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `namespace`
    pub fn with_prefix(mut self, prefix: &str, namespace: &str) -> Self {
        self.prefixes.insert(namespace.to_string(), prefix.to_string());
        self
    }

    /// Register a list and its key leaves (in key order)
    pub fn with_list(mut self, path: SchemaPath, keys: &[&str]) -> Self {
        let namespace = path
            .last()
            .map(|qname| qname.namespace.clone())
            .unwrap_or_default();
        let keys = keys
            .iter()
            .map(|key| QName::new(namespace.clone(), *key))
            .collect();
        self.lists.insert(path, keys);
        self
    }

    /// Register a config leaf
    pub fn with_leaf(mut self, path: SchemaPath) -> Self {
        self.leaves.insert(path);
        self
    }

    /// Register a state leaf (everything at and under it is state)
    pub fn with_state_leaf(mut self, path: SchemaPath) -> Self {
        self.leaves.insert(path.clone());
        self.state_roots.insert(path);
        self
    }

    /// Register a state container or list
    pub fn with_state_container(mut self, path: SchemaPath) -> Self {
        self.state_roots.insert(path);
        self
    }
}

impl NamespaceContext for StaticSchema {
    fn prefix_for(&self, namespace: &str) -> Option<String> {
        self.prefixes.get(namespace).cloned()
    }

    fn namespace_for(&self, prefix: &str) -> Option<String> {
        self.prefixes
            .iter()
            .find(|(_, p)| p.as_str() == prefix)
            .map(|(namespace, _)| namespace.clone())
    }
}

impl SchemaLookup for StaticSchema {
    fn list_keys(&self, path: &SchemaPath) -> Vec<QName> {
        self.lists.get(path).cloned().unwrap_or_default()
    }

    fn is_config(&self, path: &SchemaPath) -> bool {
        !self.state_roots.iter().any(|root| root.is_prefix_of(path))
    }

    fn is_leaf(&self, path: &SchemaPath) -> bool {
        self.leaves.contains(path)
    }

    fn state_children(&self, parent: &SchemaPath) -> Vec<StateChild> {
        self.state_roots
            .iter()
            .filter(|root| root.parent().as_ref() == Some(parent))
            .filter_map(|root| {
                root.last().map(|qname| StateChild {
                    qname: qname.clone(),
                    is_leaf: self.leaves.contains(root),
                })
            })
            .collect()
    }
}
