//! Folding filter nodes into a canonical tree
//!
//! Two nodes merge when they have the same type and the same set of match
//! nodes. Siblings that cannot merge are both kept, so the merged tree is the
//! union of what each input fragment selects.

use crate::errors::{NetconfError, Result};
use crate::filter::{FilterMatchNode, FilterNode};
use crate::node_id::NodeId;

impl FilterNode {
    /// Same namespace and local name
    pub fn is_same_type(&self, other: &FilterNode) -> bool {
        self.node_name == other.node_name && self.namespace == other.namespace
    }

    /// Same type and the same match nodes (as a set)
    pub fn can_be_merged(&self, other: &FilterNode) -> bool {
        self.is_same_type(other) && self.match_set() == other.match_set()
    }

    /// Merge `other` into `self`
    ///
    /// # Errors
    ///
    /// `FilterTypeMismatch` when the nodes differ in type,
    /// `FilterNotMergeable` when their match nodes differ.
    pub fn merge(&mut self, other: FilterNode) -> Result<()> {
        if !self.is_same_type(&other) {
            return Err(NetconfError::FilterTypeMismatch {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        if self.match_set() != other.match_set() {
            return Err(NetconfError::FilterNotMergeable {
                node: self.to_string(),
            });
        }
        self.absorb(other);
        Ok(())
    }

    /// Add a select node unless one of the same type is already there
    pub fn add_select_node(&mut self, select: FilterNode) {
        if !self.has_select_node(&select.qname()) {
            self.select_nodes_mut().push(select);
        }
        self.prune_subsumed_children();
    }

    /// Merge `child` into a mergeable sibling, or append it
    pub fn add_or_merge_child(&mut self, child: FilterNode) {
        match self
            .child_nodes_mut()
            .iter_mut()
            .find(|existing| existing.can_be_merged(&child))
        {
            Some(existing) => existing.absorb(child),
            None => self.child_nodes_mut().push(child),
        }
        self.prune_subsumed_children();
    }

    // Caller has checked can_be_merged.
    fn absorb(&mut self, other: FilterNode) {
        let FilterNode {
            attributes,
            match_nodes,
            select_nodes,
            child_nodes,
            ..
        } = other;
        self.attributes_mut().extend(attributes);
        for match_node in match_nodes {
            self.add_match_node(match_node);
        }
        for select in select_nodes {
            self.add_select_node(select);
        }
        for child in child_nodes {
            self.add_or_merge_child(child);
        }
    }

    // A select node returns the whole subtree, which already covers any
    // containment sibling of the same type that has no match nodes.
    fn prune_subsumed_children(&mut self) {
        let selected: Vec<_> = self.select_nodes().iter().map(FilterNode::qname).collect();
        if selected.is_empty() {
            return;
        }
        self.child_nodes_mut().retain(|child| {
            !(child.match_nodes().is_empty() && selected.contains(&child.qname()))
        });
    }
}

/// Narrowest filter that selects exactly the subtree at `node_id`
///
/// Each level becomes a containment node whose match nodes are that level's
/// keys. Returns `None` for the empty id.
pub fn node_id_to_filter(node_id: &NodeId) -> Option<FilterNode> {
    let mut levels: Vec<FilterNode> = node_id
        .levels()
        .into_iter()
        .filter(|level| level.container.is_container())
        .map(|level| {
            let mut node =
                FilterNode::new(level.container.namespace.clone(), level.container.value.clone());
            for key in level.keys {
                node.add_match_node(FilterMatchNode::new(
                    key.namespace.clone(),
                    key.rdn_type.clone(),
                    key.value.clone(),
                ));
            }
            node
        })
        .collect();

    let mut current = levels.pop()?;
    while let Some(mut parent) = levels.pop() {
        parent.add_or_merge_child(current);
        current = parent;
    }
    Some(current)
}
