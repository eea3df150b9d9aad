//! Edit-config request model
//!
//! An `<edit-config>` payload is turned into a forest of
//! [`EditContainmentNode`]s, one per top-level element. Each node knows its
//! effective operation (explicit or inherited), its list keys, the leaves it
//! changes and its child nodes. The aggregator applies these trees and the
//! change router turns them into [`crate::change::ChangeEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{NetconfError, Result};
use crate::node_id::{NodeId, Rdn};
use crate::schema::{NamespaceContext, SchemaLookup, SchemaPath};
use crate::xml::{Element, QName, NETCONF_BASE_NS};

/// YANG XML namespace, owner of the `insert` / `key` attributes
pub const YANG_NS: &str = "urn:ietf:params:xml:ns:yang:1";

/// The `operation` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOperation {
    Merge,
    Replace,
    Create,
    Delete,
    Remove,
    /// Navigate only; the node must exist and is not itself changed
    None,
}

impl EditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditOperation::Merge => "merge",
            EditOperation::Replace => "replace",
            EditOperation::Create => "create",
            EditOperation::Delete => "delete",
            EditOperation::Remove => "remove",
            EditOperation::None => "none",
        }
    }

    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim() {
            "merge" => Some(EditOperation::Merge),
            "replace" => Some(EditOperation::Replace),
            "create" => Some(EditOperation::Create),
            "delete" => Some(EditOperation::Delete),
            "remove" => Some(EditOperation::Remove),
            "none" => Some(EditOperation::None),
            _ => None,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, EditOperation::Delete | EditOperation::Remove)
    }
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<default-operation>` of an edit-config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOperation {
    #[default]
    Merge,
    Replace,
    None,
}

impl DefaultOperation {
    pub fn as_edit_operation(self) -> EditOperation {
        match self {
            DefaultOperation::Merge => EditOperation::Merge,
            DefaultOperation::Replace => EditOperation::Replace,
            DefaultOperation::None => EditOperation::None,
        }
    }
}

/// Where an ordered-by-user list entry goes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsertPosition {
    First,
    Last,
    /// Before the sibling with these key values (in key order)
    Before(Vec<String>),
    After(Vec<String>),
}

/// One edit-config request against a named datastore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditConfigRequest {
    pub target: String,
    pub default_operation: DefaultOperation,
    /// Top-level config elements, or the `<config>` element wrapping them
    pub config: Vec<Element>,
    pub message_id: Option<String>,
    /// Produced by the validator rather than sent by a client
    pub implied: bool,
}

impl EditConfigRequest {
    pub fn new(target: impl Into<String>, config: Vec<Element>) -> Self {
        Self {
            target: target.into(),
            default_operation: DefaultOperation::default(),
            config,
            message_id: None,
            implied: false,
        }
    }

    pub fn with_default_operation(mut self, default_operation: DefaultOperation) -> Self {
        self.default_operation = default_operation;
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Mark as a validator-implied edit
    pub fn implied(mut self) -> Self {
        self.implied = true;
        self
    }
}

/// A list key and its value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditMatchNode {
    pub qname: QName,
    pub value: String,
}

/// A leaf the edit touches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditChangeNode {
    pub qname: QName,
    /// `None` for empty leaves
    pub value: Option<String>,
    pub operation: EditOperation,
    pub explicit: bool,
}

/// An element level of an edit tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditContainmentNode {
    pub qname: QName,
    pub operation: EditOperation,
    /// The element carried its own `operation` attribute
    pub explicit_operation: bool,
    pub keys: Vec<EditMatchNode>,
    pub changes: Vec<EditChangeNode>,
    pub children: Vec<EditContainmentNode>,
    pub insert: Option<InsertPosition>,
}

impl EditContainmentNode {
    pub fn new(qname: QName, operation: EditOperation) -> Self {
        Self {
            qname,
            operation,
            explicit_operation: false,
            keys: Vec::new(),
            changes: Vec::new(),
            children: Vec::new(),
            insert: None,
        }
    }

    /// Id of this node when it sits below `parent`
    pub fn node_id(&self, parent: &NodeId) -> NodeId {
        parent.child(
            Rdn::container(self.qname.namespace.clone(), self.qname.local_name.clone()),
            self.keys.iter().map(|key| {
                Rdn::key(
                    key.qname.namespace.clone(),
                    key.qname.local_name.clone(),
                    key.value.clone(),
                )
            }),
        )
    }

    /// Whether `element` is the data instance this node addresses
    pub fn matches_element(&self, element: &Element) -> bool {
        element.is(&self.qname.namespace, &self.qname.local_name)
            && self
                .keys
                .iter()
                .all(|key| element.child_text(&key.qname) == Some(key.value.as_str()))
    }

    /// Same type and key values as `other`
    pub fn same_instance(&self, other: &EditContainmentNode) -> bool {
        self.qname == other.qname
            && self.keys.len() == other.keys.len()
            && self.keys.iter().all(|key| other.keys.contains(key))
    }

    /// Leaves whose value this node actually changes
    pub fn changed_leaves(&self) -> impl Iterator<Item = &EditChangeNode> {
        self.changes
            .iter()
            .filter(|change| change.operation != EditOperation::None)
    }

    /// The data this node writes, without removed leaves or subtrees
    pub fn to_element(&self) -> Element {
        let mut element = Element::new(self.qname.namespace.clone(), self.qname.local_name.clone());
        for key in &self.keys {
            element.children.push(Element::leaf(
                key.qname.namespace.clone(),
                key.qname.local_name.clone(),
                key.value.clone(),
            ));
        }
        for change in self.changes.iter().filter(|c| !c.operation.is_removal()) {
            let mut leaf = Element::new(change.qname.namespace.clone(), change.qname.local_name.clone());
            leaf.text = change.value.clone();
            element.children.push(leaf);
        }
        for child in self.children.iter().filter(|c| !c.operation.is_removal()) {
            element.children.push(child.to_element());
        }
        element
    }

    fn from_element<S: SchemaLookup + ?Sized>(
        element: &Element,
        parent_id: &NodeId,
        parent_path: &SchemaPath,
        inherited: EditOperation,
        schema: &S,
    ) -> Result<Self> {
        let qname = element.qname();
        let path = parent_path.child(qname.clone());
        let (operation, explicit_operation) = operation_of(element, inherited)?;

        let key_names = schema.list_keys(&path);
        let mut keys = Vec::with_capacity(key_names.len());
        for key in &key_names {
            match element.child_text(key) {
                Some(value) => keys.push(EditMatchNode {
                    qname: key.clone(),
                    value: value.to_string(),
                }),
                None => {
                    let at = parent_id
                        .append(Rdn::container(qname.namespace.clone(), qname.local_name.clone()));
                    return Err(NetconfError::MandatoryAttributeMissing {
                        path: at.xpath_string(schema),
                        attribute: key.local_name.clone(),
                    });
                }
            }
        }

        let mut node = Self {
            insert: insert_position(element)?,
            keys,
            explicit_operation,
            ..Self::new(qname, operation)
        };
        let node_id = node.node_id(parent_id);

        for child in &element.children {
            let child_qname = child.qname();
            if key_names.contains(&child_qname) {
                continue;
            }
            let child_path = path.child(child_qname.clone());
            if schema.is_leaf(&child_path) || (child.is_leaf() && child.text_content().is_some()) {
                let (child_op, explicit) = operation_of(child, operation)?;
                node.changes.push(EditChangeNode {
                    qname: child_qname,
                    value: child.text_content().map(str::to_string),
                    operation: child_op,
                    explicit,
                });
            } else {
                let child_node = Self::from_element(child, &node_id, &path, operation, schema)?;
                if node
                    .children
                    .iter()
                    .any(|existing| existing.same_instance(&child_node))
                {
                    return Err(NetconfError::DuplicateSibling {
                        path: child_node.node_id(&node_id).xpath_string(schema),
                    });
                }
                node.children.push(child_node);
            }
        }
        Ok(node)
    }
}

/// Build edit trees from the config of a request
///
/// # Errors
///
/// `UnknownNamespace` for elements whose namespace cannot be resolved,
/// `BadAttribute` for unknown operation or insert values,
/// `MandatoryAttributeMissing` for list entries without their keys and
/// `DuplicateSibling` when the same instance appears twice under one parent.
pub fn parse_edit_trees<S: SchemaLookup + ?Sized>(
    request: &EditConfigRequest,
    schema: &S,
) -> Result<Vec<EditContainmentNode>> {
    let root_id = NodeId::new();
    let root_path = SchemaPath::root();
    let inherited = request.default_operation.as_edit_operation();

    let mut trees: Vec<EditContainmentNode> = Vec::new();
    for top in top_level_elements(&request.config) {
        let qualified = qualify(top, None, schema)?;
        let tree =
            EditContainmentNode::from_element(&qualified, &root_id, &root_path, inherited, schema)?;
        if trees.iter().any(|existing| existing.same_instance(&tree)) {
            return Err(NetconfError::DuplicateSibling {
                path: tree.node_id(&root_id).xpath_string(schema),
            });
        }
        trees.push(tree);
    }
    Ok(trees)
}

fn top_level_elements(config: &[Element]) -> impl Iterator<Item = &Element> {
    config.iter().flat_map(|element| {
        if element.is(NETCONF_BASE_NS, "config") {
            element.children.iter().collect::<Vec<_>>()
        } else {
            vec![element]
        }
    })
}

// Copy of `element` with every namespace resolved: explicit namespace first,
// then the prefix, then the parent's namespace.
fn qualify<C: NamespaceContext + ?Sized>(
    element: &Element,
    inherited: Option<&str>,
    ctx: &C,
) -> Result<Element> {
    let namespace = match element.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        Some(namespace) => namespace.to_string(),
        None => match element.prefix.as_deref() {
            Some(prefix) => ctx.namespace_for(prefix).ok_or_else(|| NetconfError::UnknownNamespace {
                element: format!("{}:{}", prefix, element.name),
            })?,
            None => inherited
                .map(str::to_string)
                .ok_or_else(|| NetconfError::UnknownNamespace {
                    element: element.name.clone(),
                })?,
        },
    };
    let children = element
        .children
        .iter()
        .map(|child| qualify(child, Some(&namespace), ctx))
        .collect::<Result<Vec<_>>>()?;
    Ok(Element {
        namespace: Some(namespace),
        children,
        ..element.clone()
    })
}

fn operation_of(element: &Element, inherited: EditOperation) -> Result<(EditOperation, bool)> {
    match element.attribute(Some(NETCONF_BASE_NS), "operation") {
        Some(value) => EditOperation::from_code(value)
            .map(|op| (op, true))
            .ok_or_else(|| NetconfError::BadAttribute {
                element: element.name.clone(),
                attribute: "operation".to_string(),
                value: value.to_string(),
            }),
        None => Ok((inherited, false)),
    }
}

fn insert_position(element: &Element) -> Result<Option<InsertPosition>> {
    let Some(insert) = element.attribute(Some(YANG_NS), "insert") else {
        return Ok(None);
    };
    let bad = |attribute: &str, value: &str| NetconfError::BadAttribute {
        element: element.name.clone(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    };
    let anchor = || {
        element
            .attribute(Some(YANG_NS), "key")
            .map(predicate_values)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| bad("key", ""))
    };
    match insert.trim() {
        "first" => Ok(Some(InsertPosition::First)),
        "last" => Ok(Some(InsertPosition::Last)),
        "before" => Ok(Some(InsertPosition::Before(anchor()?))),
        "after" => Ok(Some(InsertPosition::After(anchor()?))),
        other => Err(bad("insert", other)),
    }
}

/// Quoted values of a key predicate, `[a:x='1'][a:y="2"]` → `["1", "2"]`
pub fn predicate_values(predicate: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut chars = predicate.chars();
    while let Some(ch) = chars.next() {
        if ch == '\'' || ch == '"' {
            let value: String = chars.by_ref().take_while(|c| *c != ch).collect();
            values.push(value);
        }
    }
    values
}
