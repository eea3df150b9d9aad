use std::sync::Mutex;

use netconf_core::change_router::ChangeNotification;
use netconf_core::errors::RpcError;
use netconf_core::node_id::{NodeId, Rdn};
use netconf_core::schema::{SchemaPath, StaticSchema};
use netconf_core::subsystem::{StateAttributeQuery, StateAttributeResponse, Subsystem};
use netconf_core::xml::Element;

pub const NS: &str = "urn:example:jukebox";

#[allow(dead_code)]
pub fn schema() -> StaticSchema {
    StaticSchema::new()
        .with_prefix("jbox", NS)
        .with_list(SchemaPath::of(NS, &["library", "artist"]), &["name"])
        .with_leaf(SchemaPath::of(NS, &["library", "artist", "name"]))
        .with_leaf(SchemaPath::of(NS, &["library", "artist", "genre"]))
        .with_list(SchemaPath::of(NS, &["library", "artist", "album"]), &["name"])
        .with_leaf(SchemaPath::of(NS, &["library", "artist", "album", "name"]))
        .with_leaf(SchemaPath::of(NS, &["library", "artist", "album", "year"]))
        .with_state_leaf(SchemaPath::of(NS, &["library", "artist", "plays"]))
}

/// `/library/artist[name=<name>]`
#[allow(dead_code)]
pub fn artist_id(name: &str) -> NodeId {
    NodeId::new()
        .with_rdn(Rdn::container(NS, "library"))
        .child(Rdn::container(NS, "artist"), [Rdn::key(NS, "name", name)])
}

/// Subsystem that keeps every query and notification batch it receives
#[allow(dead_code)]
#[derive(Default)]
pub struct Recorder {
    pub name: &'static str,
    pub queries: Mutex<Vec<StateAttributeQuery>>,
    pub batches: Mutex<Vec<Vec<ChangeNotification>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn requests_received(&self) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(StateAttributeQuery::request_count)
            .sum()
    }

    pub fn batches(&self) -> Vec<Vec<ChangeNotification>> {
        self.batches.lock().unwrap().clone()
    }
}

impl Subsystem for Recorder {
    fn id(&self) -> &str {
        self.name
    }

    fn retrieve_state_attributes(
        &self,
        query: &StateAttributeQuery,
    ) -> Result<StateAttributeResponse, RpcError> {
        self.queries.lock().unwrap().push(query.clone());
        let mut response = StateAttributeResponse::new();
        for (node_id, entry) in query.iter() {
            let answers = response.entry(node_id.clone()).or_default();
            for leaf in &entry.leaves {
                answers.push(Element::leaf(
                    leaf.namespace.clone(),
                    leaf.local_name.clone(),
                    node_id.len().to_string(),
                ));
            }
        }
        Ok(response)
    }

    fn notify_changed(&self, notifications: &[ChangeNotification]) {
        self.batches.lock().unwrap().push(notifications.to_vec());
    }
}
