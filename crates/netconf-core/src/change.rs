//! Change events derived from applied edit trees

use serde::{Deserialize, Serialize};

use crate::edit::{EditContainmentNode, EditOperation};
use crate::node_id::NodeId;

/// What happened to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "edit", rename_all = "lowercase")]
pub enum ChangeKind {
    Create(EditContainmentNode),
    Replace(EditContainmentNode),
    Merge(EditContainmentNode),
    Delete(EditContainmentNode),
    Remove(EditContainmentNode),
    /// An ordered-by-user entry was (re)positioned
    Move(EditContainmentNode),
}

impl ChangeKind {
    pub fn edit(&self) -> &EditContainmentNode {
        match self {
            ChangeKind::Create(edit)
            | ChangeKind::Replace(edit)
            | ChangeKind::Merge(edit)
            | ChangeKind::Delete(edit)
            | ChangeKind::Remove(edit)
            | ChangeKind::Move(edit) => edit,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChangeKind::Create(_) => "create",
            ChangeKind::Replace(_) => "replace",
            ChangeKind::Merge(_) => "merge",
            ChangeKind::Delete(_) => "delete",
            ChangeKind::Remove(_) => "remove",
            ChangeKind::Move(_) => "move",
        }
    }
}

/// One logical change to the data tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub node_id: NodeId,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(node_id: NodeId, kind: ChangeKind) -> Self {
        Self { node_id, kind }
    }

    pub fn edit(&self) -> &EditContainmentNode {
        self.kind.edit()
    }
}

/// Turn applied edit trees into change events, parents before children
///
/// A node yields an event when its operation differs from the one it
/// inherited (a `replace` subtree is one change, not one per descendant), or
/// when a `merge` node changes leaves of its own. Positioned entries yield a
/// `Move` instead of their merge/replace event.
pub fn derive_change_events(trees: &[EditContainmentNode]) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    let root = NodeId::new();
    for tree in trees {
        collect(tree, &root, None, &mut events);
    }
    events
}

fn collect(
    node: &EditContainmentNode,
    parent_id: &NodeId,
    inherited: Option<EditOperation>,
    events: &mut Vec<ChangeEvent>,
) {
    let node_id = node.node_id(parent_id);
    let differs = inherited != Some(node.operation);

    let kind = match node.operation {
        _ if node.insert.is_some()
            && matches!(node.operation, EditOperation::Merge | EditOperation::Replace) =>
        {
            Some(ChangeKind::Move(node.clone()))
        }
        EditOperation::Create if differs => Some(ChangeKind::Create(node.clone())),
        EditOperation::Replace if differs => Some(ChangeKind::Replace(node.clone())),
        EditOperation::Delete if differs => Some(ChangeKind::Delete(node.clone())),
        EditOperation::Remove if differs => Some(ChangeKind::Remove(node.clone())),
        EditOperation::Merge if node.changed_leaves().next().is_some() => {
            Some(ChangeKind::Merge(node.clone()))
        }
        _ => None,
    };
    if let Some(kind) = kind {
        events.push(ChangeEvent::new(node_id.clone(), kind));
    }

    for child in &node.children {
        collect(child, &node_id, Some(node.operation), events);
    }
}
