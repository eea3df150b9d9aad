//! Element-tree aggregator
//!
//! Holds the configuration as a plain element forest. Edits are applied to a
//! working copy that replaces the live tree only when every node succeeded.

use std::sync::Arc;

use netconf_core::aggregator::Aggregator;
use netconf_core::edit::{
    parse_edit_trees, EditChangeNode, EditConfigRequest, EditContainmentNode, EditOperation,
    InsertPosition,
};
use netconf_core::errors::{NetconfError, Result};
use netconf_core::filter::{apply_filter, FilterNode};
use netconf_core::node_id::{NodeId, Rdn};
use netconf_core::schema::SchemaLookup;
use netconf_core::xml::Element;

pub struct InMemoryAggregator {
    data: Vec<Element>,
    schema: Arc<dyn SchemaLookup>,
}

impl InMemoryAggregator {
    pub fn new(schema: Arc<dyn SchemaLookup>) -> Self {
        Self {
            data: Vec::new(),
            schema,
        }
    }

    /// Start from existing content (assumed fully qualified)
    pub fn with_content(mut self, content: Vec<Element>) -> Self {
        self.data = content;
        self
    }

    pub fn content(&self) -> &[Element] {
        &self.data
    }

    // Returns the node as it took effect, or `None` when it changed nothing
    fn apply_node(
        &self,
        siblings: &mut Vec<Element>,
        node: &EditContainmentNode,
        parent_id: &NodeId,
    ) -> Result<Option<EditContainmentNode>> {
        let node_id = node.node_id(parent_id);
        let position = siblings.iter().position(|element| node.matches_element(element));

        match node.operation {
            EditOperation::Create => {
                if position.is_some() {
                    return Err(NetconfError::DataExists {
                        path: node_id.xpath_string(self.schema.as_ref()),
                    });
                }
                self.insert(siblings, node.to_element(), node, None)?;
                Ok(Some(node.clone()))
            }
            EditOperation::Delete | EditOperation::Remove => match position {
                Some(index) => {
                    siblings.remove(index);
                    Ok(Some(node.clone()))
                }
                None if node.operation == EditOperation::Remove => Ok(None),
                None => Err(NetconfError::DataMissing {
                    path: node_id.xpath_string(self.schema.as_ref()),
                }),
            },
            EditOperation::Replace => {
                if let Some(index) = position {
                    siblings.remove(index);
                }
                self.insert(siblings, node.to_element(), node, position)?;
                Ok(Some(node.clone()))
            }
            EditOperation::Merge | EditOperation::None => {
                let index = match position {
                    Some(index) => index,
                    None if node.operation == EditOperation::None => {
                        if only_removes(node) {
                            return Ok(None);
                        }
                        return Err(NetconfError::DataMissing {
                            path: node_id.xpath_string(self.schema.as_ref()),
                        });
                    }
                    None => {
                        let shell = EditContainmentNode {
                            changes: Vec::new(),
                            children: Vec::new(),
                            ..node.clone()
                        };
                        self.insert(siblings, shell.to_element(), node, None)?
                    }
                };

                let mut applied = EditContainmentNode {
                    changes: Vec::new(),
                    children: Vec::new(),
                    ..node.clone()
                };
                // A merge that brings the instance into existence reports as a create
                if position.is_none() {
                    applied.operation = EditOperation::Create;
                }
                let element = &mut siblings[index];
                for change in &node.changes {
                    if self.apply_leaf(element, change, &node_id)? {
                        applied.changes.push(change.clone());
                    }
                }
                for child in &node.children {
                    if let Some(done) = self.apply_node(&mut element.children, child, &node_id)? {
                        applied.children.push(done);
                    }
                }

                if node.insert.is_some() {
                    let moved = siblings.remove(index);
                    self.insert(siblings, moved, node, None)?;
                }
                Ok(Some(applied))
            }
        }
    }

    // Returns whether the leaf changed
    fn apply_leaf(
        &self,
        element: &mut Element,
        change: &EditChangeNode,
        node_id: &NodeId,
    ) -> Result<bool> {
        let existing = element
            .children
            .iter()
            .position(|child| child.is(&change.qname.namespace, &change.qname.local_name));
        let leaf_path = || {
            node_id
                .append(Rdn::container(
                    change.qname.namespace.clone(),
                    change.qname.local_name.clone(),
                ))
                .xpath_string(self.schema.as_ref())
        };

        match (change.operation, existing) {
            (EditOperation::None, _) => Ok(false),
            (EditOperation::Create, Some(_)) => Err(NetconfError::DataExists { path: leaf_path() }),
            (EditOperation::Delete, None) => Err(NetconfError::DataMissing { path: leaf_path() }),
            (EditOperation::Remove, None) => Ok(false),
            (EditOperation::Delete | EditOperation::Remove, Some(index)) => {
                element.children.remove(index);
                Ok(true)
            }
            (_, Some(index)) => {
                let leaf = &mut element.children[index];
                if leaf.text == change.value {
                    return Ok(false);
                }
                leaf.text = change.value.clone();
                Ok(true)
            }
            (_, None) => {
                let mut leaf = Element::new(
                    change.qname.namespace.clone(),
                    change.qname.local_name.clone(),
                );
                leaf.text = change.value.clone();
                element.children.push(leaf);
                Ok(true)
            }
        }
    }

    // Places `element` among its siblings and returns its index. Without an
    // explicit position it goes to `hint` (its old slot) or after the last
    // sibling of the same type.
    fn insert(
        &self,
        siblings: &mut Vec<Element>,
        element: Element,
        node: &EditContainmentNode,
        hint: Option<usize>,
    ) -> Result<usize> {
        let same_type = |candidate: &Element| {
            candidate.is(&node.qname.namespace, &node.qname.local_name)
        };
        let index = match &node.insert {
            Some(InsertPosition::First) => siblings
                .iter()
                .position(same_type)
                .unwrap_or(siblings.len()),
            Some(InsertPosition::Before(anchor)) => self.anchor_index(siblings, node, anchor)?,
            Some(InsertPosition::After(anchor)) => self.anchor_index(siblings, node, anchor)? + 1,
            Some(InsertPosition::Last) | None => match hint {
                Some(index) if node.insert.is_none() => index.min(siblings.len()),
                _ => siblings
                    .iter()
                    .rposition(same_type)
                    .map(|last| last + 1)
                    .unwrap_or(siblings.len()),
            },
        };
        siblings.insert(index, element);
        Ok(index)
    }

    fn anchor_index(
        &self,
        siblings: &[Element],
        node: &EditContainmentNode,
        anchor: &[String],
    ) -> Result<usize> {
        siblings
            .iter()
            .position(|candidate| {
                candidate.is(&node.qname.namespace, &node.qname.local_name)
                    && node.keys.len() == anchor.len()
                    && node
                        .keys
                        .iter()
                        .zip(anchor)
                        .all(|(key, value)| candidate.child_text(&key.qname) == Some(value.as_str()))
            })
            .ok_or_else(|| NetconfError::BadAttribute {
                element: node.qname.local_name.clone(),
                attribute: "key".to_string(),
                value: anchor.join(","),
            })
    }
}

fn only_removes(node: &EditContainmentNode) -> bool {
    node.changes
        .iter()
        .all(|change| matches!(change.operation, EditOperation::Remove | EditOperation::None))
        && node.children.iter().all(|child| {
            child.operation == EditOperation::Remove
                || (child.operation == EditOperation::None && only_removes(child))
        })
}

impl Aggregator for InMemoryAggregator {
    fn edit_config(&mut self, request: &EditConfigRequest) -> Result<Vec<EditContainmentNode>> {
        let trees = parse_edit_trees(request, self.schema.as_ref())?;
        let mut working = self.data.clone();
        let root = NodeId::new();

        let mut applied = Vec::with_capacity(trees.len());
        for tree in &trees {
            if let Some(done) = self.apply_node(&mut working, tree, &root)? {
                applied.push(done);
            }
        }
        tracing::debug!(
            target = request.target.as_str(),
            trees = trees.len(),
            applied = applied.len(),
            "edit applied"
        );
        self.data = working;
        Ok(applied)
    }

    fn get_config(&self, filter: Option<&FilterNode>) -> Result<Vec<Element>> {
        Ok(match filter {
            Some(root) => apply_filter(&self.data, root, self.schema.as_ref()),
            None => self.data.clone(),
        })
    }

    fn replace_all(&mut self, content: Vec<Element>) -> Result<()> {
        self.data = content;
        Ok(())
    }
}
