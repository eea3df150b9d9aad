//! Filling config data with state from subsystems
//!
//! The walker descends the config tree a `get` produced, works out which
//! state leaves and subtrees the filter asks for below each node, batches
//! those requests per owning subsystem, and splices the answers in. All
//! subsystem traffic goes through the request's [`ResponseCache`].

use std::collections::HashSet;
use std::sync::Arc;

use netconf_core_types::ClientInfo;

use crate::cache::ResponseCache;
use crate::errors::Result;
use crate::filter::apply::matching_branches;
use crate::filter::FilterNode;
use crate::node_id::{NodeId, Rdn};
use crate::schema::{SchemaLookup, SchemaPath};
use crate::subsystem::{StateAttributeQuery, Subsystem, SubsystemRegistry};
use crate::xml::{Element, QName};

/// What part of a node's subtree the request wants
#[derive(Debug, Clone)]
enum Scope<'f> {
    Everything,
    Branches(Vec<&'f FilterNode>),
}

impl<'f> Scope<'f> {
    fn from_branches(branches: Vec<&'f FilterNode>) -> Option<Self> {
        if branches.is_empty() {
            None
        } else if branches.iter().any(|branch| branch.is_select_all()) {
            Some(Scope::Everything)
        } else {
            Some(Scope::Branches(branches))
        }
    }
}

pub struct StateWalker<'a, S: SchemaLookup + ?Sized> {
    schema: &'a S,
    registry: &'a SubsystemRegistry,
    client: &'a ClientInfo,
    permitted: HashSet<String>,
}

impl<'a, S: SchemaLookup + ?Sized> StateWalker<'a, S> {
    pub fn new(schema: &'a S, registry: &'a SubsystemRegistry, client: &'a ClientInfo) -> Self {
        Self {
            schema,
            registry,
            client,
            permitted: HashSet::new(),
        }
    }

    /// Add the state `filter` selects to `data` (top-level config elements)
    ///
    /// `None` means no filter: all state below all returned config.
    ///
    /// # Errors
    ///
    /// `AccessDenied` from a subsystem's permission check, or `Subsystem` when
    /// a subsystem fails to answer.
    pub fn populate(
        &mut self,
        data: &mut Vec<Element>,
        filter: Option<&FilterNode>,
        cache: &mut ResponseCache,
    ) -> Result<()> {
        let scope = match filter {
            None => Scope::Everything,
            Some(root) if root.is_select_all() => return Ok(()),
            Some(root) => Scope::Branches(vec![root]),
        };
        self.walk(data, &NodeId::new(), &SchemaPath::root(), &scope, cache)
    }

    fn walk(
        &mut self,
        children: &mut Vec<Element>,
        node_id: &NodeId,
        path: &SchemaPath,
        scope: &Scope<'_>,
        cache: &mut ResponseCache,
    ) -> Result<()> {
        for child in children.iter_mut() {
            let qname = child.qname();
            let child_path = path.child(qname.clone());
            if !self.schema.is_config(&child_path) || self.is_leaf(child, &child_path) {
                continue;
            }
            let child_scope = match scope {
                Scope::Everything => Some(Scope::Everything),
                Scope::Branches(branches) => self.child_scope(child, branches, path),
            };
            if let Some(child_scope) = child_scope {
                let child_id = self.instance_id(child, node_id, &child_path);
                self.walk(&mut child.children, &child_id, &child_path, &child_scope, cache)?;
            }
        }

        let query = self.state_requests(node_id, path, scope);
        for (subsystem, query) in query {
            self.check_permission(subsystem.as_ref())?;
            let mut response = cache.retrieve(subsystem.as_ref(), &query)?;
            for element in response.remove(node_id).unwrap_or_default() {
                if !children.contains(&element) {
                    children.push(element);
                }
            }
        }
        Ok(())
    }

    fn is_leaf(&self, element: &Element, path: &SchemaPath) -> bool {
        self.schema.is_leaf(path) || (element.is_leaf() && element.text_content().is_some())
    }

    fn child_scope<'f>(
        &self,
        child: &Element,
        branches: &[&'f FilterNode],
        parent_path: &SchemaPath,
    ) -> Option<Scope<'f>> {
        let qname = child.qname();
        if branches.iter().any(|branch| branch.has_select_node(&qname)) {
            return Some(Scope::Everything);
        }
        let nested: Vec<&'f FilterNode> = branches
            .iter()
            .flat_map(|branch| {
                let branch: &'f FilterNode = branch;
                matching_branches(child, branch.child_nodes().iter(), parent_path, self.schema)
            })
            .collect();
        Scope::from_branches(nested)
    }

    fn instance_id(&self, element: &Element, parent: &NodeId, path: &SchemaPath) -> NodeId {
        let keys = self
            .schema
            .list_keys(path)
            .into_iter()
            .filter_map(|key| {
                element
                    .child_text(&key)
                    .map(|value| Rdn::key(key.namespace.clone(), key.local_name.clone(), value))
            })
            .collect::<Vec<_>>();
        parent.child(
            Rdn::container(element.namespace.clone().unwrap_or_default(), element.name.clone()),
            keys,
        )
    }

    // Requests for state directly below `node_id`, grouped by owner
    fn state_requests(
        &self,
        node_id: &NodeId,
        path: &SchemaPath,
        scope: &Scope<'_>,
    ) -> Vec<(Arc<dyn Subsystem>, StateAttributeQuery)> {
        let mut leaves: Vec<QName> = Vec::new();
        let mut filters: Vec<FilterNode> = Vec::new();

        match scope {
            Scope::Everything => {
                for state in self.schema.state_children(path) {
                    if state.is_leaf {
                        leaves.push(state.qname);
                    } else {
                        filters.push(FilterNode::new(state.qname.namespace, state.qname.local_name));
                    }
                }
            }
            Scope::Branches(branches) => {
                for branch in branches {
                    for select in branch.select_nodes() {
                        let state_path = path.child(select.qname());
                        if self.schema.is_config(&state_path) {
                            continue;
                        }
                        if self.schema.is_leaf(&state_path) {
                            leaves.push(select.qname());
                        } else {
                            filters.push(select.clone());
                        }
                    }
                    for nested in branch.child_nodes() {
                        if !self.schema.is_config(&path.child(nested.qname())) {
                            filters.push(nested.clone());
                        }
                    }
                }
            }
        }

        let mut grouped: Vec<(Arc<dyn Subsystem>, StateAttributeQuery)> = Vec::new();
        let mut add = |qname: &QName, request: &mut dyn FnMut(&mut StateAttributeQuery)| {
            let owner = self.registry.lookup(
                &node_id.append(Rdn::container(qname.namespace.clone(), qname.local_name.clone())),
            );
            match grouped.iter_mut().find(|(subsystem, _)| subsystem.id() == owner.id()) {
                Some((_, query)) => request(query),
                None => {
                    let mut query = StateAttributeQuery::new();
                    request(&mut query);
                    grouped.push((owner, query));
                }
            }
        };
        for leaf in leaves {
            add(&leaf, &mut |query| query.add_leaf(node_id.clone(), leaf.clone()));
        }
        for filter in filters {
            let qname = filter.qname();
            add(&qname, &mut |query| query.add_filter(node_id.clone(), filter.clone()));
        }
        grouped
    }

    fn check_permission(&mut self, subsystem: &dyn Subsystem) -> Result<()> {
        if self.client.bypass_authorization || self.permitted.contains(subsystem.id()) {
            return Ok(());
        }
        subsystem.check_required_permissions(self.client, "get")?;
        self.permitted.insert(subsystem.id().to_string());
        Ok(())
    }
}
