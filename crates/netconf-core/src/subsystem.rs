//! Subsystems: the components that own parts of the data tree
//!
//! A subsystem answers state queries for the nodes it owns, is told about
//! committed changes to them, and may veto an operation for a client. The
//! [`SubsystemRegistry`] decides which subsystem owns a node.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use netconf_core_types::ClientInfo;

use crate::change_router::ChangeNotification;
use crate::errors::{Result, RpcError};
use crate::filter::FilterNode;
use crate::node_id::NodeId;
use crate::schema::SchemaPath;
use crate::xml::{Element, QName};

/// State requested below one config node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateQueryEntry {
    /// State leaves wanted directly below the node
    pub leaves: Vec<QName>,
    /// State subtrees wanted below the node, one filter per subtree type
    pub filters: Vec<FilterNode>,
}

impl StateQueryEntry {
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.filters.is_empty()
    }
}

/// State requests keyed by the config node they hang off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateAttributeQuery {
    entries: BTreeMap<NodeId, StateQueryEntry>,
}

impl StateAttributeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_leaf(&mut self, node_id: NodeId, leaf: QName) {
        let entry = self.entries.entry(node_id).or_default();
        if !entry.leaves.contains(&leaf) {
            entry.leaves.push(leaf);
        }
    }

    pub fn add_filter(&mut self, node_id: NodeId, filter: FilterNode) {
        let entry = self.entries.entry(node_id).or_default();
        if !entry.filters.contains(&filter) {
            entry.filters.push(filter);
        }
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&StateQueryEntry> {
        self.entries.get(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &StateQueryEntry)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(StateQueryEntry::is_empty)
    }

    /// Number of leaf and filter requests across all nodes
    pub fn request_count(&self) -> usize {
        self.entries
            .values()
            .map(|entry| entry.leaves.len() + entry.filters.len())
            .sum()
    }
}

/// State elements returned per config node
pub type StateAttributeResponse = BTreeMap<NodeId, Vec<Element>>;

/// A component owning part of the data tree
pub trait Subsystem: Send + Sync {
    /// Stable identifier; responses are cached under it
    fn id(&self) -> &str;

    /// Answer a state query
    ///
    /// # Errors
    ///
    /// The RPC error to report to the client.
    fn retrieve_state_attributes(
        &self,
        _query: &StateAttributeQuery,
    ) -> std::result::Result<StateAttributeResponse, RpcError> {
        Ok(StateAttributeResponse::new())
    }

    /// Committed changes to nodes this subsystem owns, in edit order
    fn notify_changed(&self, _notifications: &[ChangeNotification]) {}

    /// Veto `operation` for `client`
    ///
    /// # Errors
    ///
    /// `AccessDenied` when the client may not perform the operation.
    fn check_required_permissions(&self, _client: &ClientInfo, _operation: &str) -> Result<()> {
        Ok(())
    }
}

/// Owns nothing, allows everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSubsystem;

impl Subsystem for NoopSubsystem {
    fn id(&self) -> &str {
        "noop"
    }
}

/// Node → subsystem resolution
///
/// Lookup walks from the node towards the root. At each level an
/// instance-specific registration wins over a schema-path registration; if
/// nothing matches the default subsystem owns the node.
pub struct SubsystemRegistry {
    by_node: BTreeMap<NodeId, Arc<dyn Subsystem>>,
    by_path: HashMap<SchemaPath, Arc<dyn Subsystem>>,
    default: Arc<dyn Subsystem>,
}

impl SubsystemRegistry {
    pub fn new() -> Self {
        Self {
            by_node: BTreeMap::new(),
            by_path: HashMap::new(),
            default: Arc::new(NoopSubsystem),
        }
    }

    pub fn with_default(mut self, subsystem: Arc<dyn Subsystem>) -> Self {
        self.default = subsystem;
        self
    }

    /// Own every node of the given schema path and everything below it
    pub fn register_path(&mut self, path: SchemaPath, subsystem: Arc<dyn Subsystem>) {
        self.by_path.insert(path, subsystem);
    }

    /// Own one instance and everything below it
    pub fn register_node(&mut self, node_id: NodeId, subsystem: Arc<dyn Subsystem>) {
        self.by_node.insert(node_id, subsystem);
    }

    pub fn lookup(&self, node_id: &NodeId) -> Arc<dyn Subsystem> {
        let mut current = Some(node_id.clone());
        while let Some(id) = current {
            if let Some(subsystem) = self.by_node.get(&id) {
                return Arc::clone(subsystem);
            }
            if let Some(subsystem) = self.by_path.get(&SchemaPath::from_node_id(&id)) {
                return Arc::clone(subsystem);
            }
            current = id.parent();
        }
        Arc::clone(&self.default)
    }

    pub fn default_subsystem(&self) -> Arc<dyn Subsystem> {
        Arc::clone(&self.default)
    }
}

impl Default for SubsystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubsystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsystemRegistry")
            .field("nodes", &self.by_node.len())
            .field("paths", &self.by_path.len())
            .field("default", &self.default.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_id::Rdn;

    const NS: &str = "urn:example:jukebox";

    struct Named(&'static str);

    impl Subsystem for Named {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn artist(name: &str) -> NodeId {
        NodeId::new()
            .with_rdn(Rdn::container(NS, "library"))
            .with_rdn(Rdn::container(NS, "artist"))
            .with_rdn(Rdn::key(NS, "name", name))
    }

    #[test]
    fn test_lookup_walks_up_to_path_registration() {
        let mut registry = SubsystemRegistry::new();
        registry.register_path(SchemaPath::of(NS, &["library"]), Arc::new(Named("library")));

        let album = artist("Lenny").with_rdn(Rdn::container(NS, "album"));
        assert_eq!(registry.lookup(&album).id(), "library");
    }

    #[test]
    fn test_instance_registration_wins() {
        let mut registry = SubsystemRegistry::new();
        registry.register_path(SchemaPath::of(NS, &["library", "artist"]), Arc::new(Named("artists")));
        registry.register_node(artist("Lenny"), Arc::new(Named("lenny")));

        assert_eq!(registry.lookup(&artist("Lenny")).id(), "lenny");
        assert_eq!(registry.lookup(&artist("Prince")).id(), "artists");
    }

    #[test]
    fn test_unowned_nodes_go_to_default() {
        let registry = SubsystemRegistry::new().with_default(Arc::new(Named("fallback")));
        assert_eq!(registry.lookup(&artist("Lenny")).id(), "fallback");
        assert_eq!(SubsystemRegistry::new().lookup(&NodeId::new()).id(), "noop");
    }

    #[test]
    fn test_query_dedups_requests() {
        let mut query = StateAttributeQuery::new();
        query.add_leaf(artist("Lenny"), QName::new(NS, "plays"));
        query.add_leaf(artist("Lenny"), QName::new(NS, "plays"));
        query.add_filter(artist("Lenny"), FilterNode::new(NS, "stats"));
        assert_eq!(query.request_count(), 2);
        assert!(!query.is_empty());
        assert!(StateAttributeQuery::new().is_empty());
    }
}
