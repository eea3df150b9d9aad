use std::sync::{Arc, Mutex};

use netconf_core::change_router::{ChangeNotification, ConfigChangeNotification, ConfigChangeSink};
use netconf_core::errors::{NetconfError, RpcError};
use netconf_core::schema::{SchemaLookup, SchemaPath, StaticSchema};
use netconf_core::subsystem::{StateAttributeQuery, StateAttributeResponse, Subsystem, SubsystemRegistry};
use netconf_core::xml::{Element, QName, NETCONF_BASE_NS};
use netconf_core_types::ClientInfo;
use netconf_engine::{NetconfResponse, NetconfServer, ServerConfig};

pub const NS: &str = "urn:example:jukebox";

/// library / artist (key name) / album (key name), with per-artist
/// `plays` state and a library-level `stats` state container
#[allow(dead_code)]
pub fn jukebox_schema() -> Arc<dyn SchemaLookup> {
    Arc::new(
        StaticSchema::new()
            .with_prefix("jbox", NS)
            .with_list(SchemaPath::of(NS, &["library", "artist"]), &["name"])
            .with_leaf(SchemaPath::of(NS, &["library", "artist", "name"]))
            .with_leaf(SchemaPath::of(NS, &["library", "artist", "genre"]))
            .with_list(SchemaPath::of(NS, &["library", "artist", "album"]), &["name"])
            .with_leaf(SchemaPath::of(NS, &["library", "artist", "album", "name"]))
            .with_leaf(SchemaPath::of(NS, &["library", "artist", "album", "year"]))
            .with_state_leaf(SchemaPath::of(NS, &["library", "artist", "plays"]))
            .with_state_container(SchemaPath::of(NS, &["library", "stats"])),
    )
}

/// Subsystem that records what it is told and answers state queries
#[derive(Default)]
pub struct RecordingSubsystem {
    pub name: String,
    pub notifications: Mutex<Vec<Vec<ChangeNotification>>>,
    pub queries: Mutex<Vec<StateAttributeQuery>>,
    pub deny: bool,
    pub fail_state: bool,
}

#[allow(dead_code)]
impl RecordingSubsystem {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    pub fn denying(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            deny: true,
            ..Self::default()
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_state: true,
            ..Self::default()
        })
    }

    /// One entry per `notify_changed` call
    pub fn batches(&self) -> Vec<Vec<ChangeNotification>> {
        self.notifications.lock().unwrap().clone()
    }

    /// Total leaf and filter requests received across all queries
    pub fn requests_received(&self) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(StateAttributeQuery::request_count)
            .sum()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl Subsystem for RecordingSubsystem {
    fn id(&self) -> &str {
        &self.name
    }

    fn retrieve_state_attributes(
        &self,
        query: &StateAttributeQuery,
    ) -> Result<StateAttributeResponse, RpcError> {
        self.queries.lock().unwrap().push(query.clone());
        if self.fail_state {
            return Err(RpcError::operation_failed("state backend offline"));
        }
        let mut response = StateAttributeResponse::new();
        for (node_id, entry) in query.iter() {
            let answers = response.entry(node_id.clone()).or_default();
            for leaf in &entry.leaves {
                answers.push(Element::leaf(leaf.namespace.clone(), leaf.local_name.clone(), "42"));
            }
            for filter in &entry.filters {
                answers.push(
                    Element::new(filter.namespace(), filter.node_name())
                        .with_child(Element::leaf(NS, "artist-count", "2")),
                );
            }
        }
        Ok(response)
    }

    fn notify_changed(&self, notifications: &[ChangeNotification]) {
        self.notifications.lock().unwrap().push(notifications.to_vec());
    }

    fn check_required_permissions(
        &self,
        client: &ClientInfo,
        operation: &str,
    ) -> netconf_core::errors::Result<()> {
        if self.deny {
            return Err(NetconfError::AccessDenied {
                operation: operation.to_string(),
                user: client.username.clone(),
            });
        }
        Ok(())
    }
}

/// Collects published config-change notifications
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<ConfigChangeNotification>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn published(&self) -> Vec<ConfigChangeNotification> {
        self.published.lock().unwrap().clone()
    }
}

impl ConfigChangeSink for RecordingSink {
    fn publish(&self, notification: &ConfigChangeNotification) {
        self.published.lock().unwrap().push(notification.clone());
    }
}

/// Registry with `player` owning artists and `library` owning the rest
#[allow(dead_code)]
pub fn registry(
    player: Arc<RecordingSubsystem>,
    library: Arc<RecordingSubsystem>,
) -> Arc<SubsystemRegistry> {
    let mut registry = SubsystemRegistry::new().with_default(library.clone());
    registry.register_path(SchemaPath::of(NS, &["library"]), library);
    registry.register_path(SchemaPath::of(NS, &["library", "artist"]), player);
    Arc::new(registry)
}

/// Server with running + candidate over the jukebox schema
#[allow(dead_code)]
pub fn server(registry: Arc<SubsystemRegistry>) -> NetconfServer {
    NetconfServer::builder(ServerConfig::default(), jukebox_schema(), registry).build()
}

#[allow(dead_code)]
pub fn admin(session_id: u32) -> ClientInfo {
    ClientInfo::new(session_id, "admin")
}

#[allow(dead_code)]
pub fn artist(name: &str) -> Element {
    Element::new(NS, "artist").with_child(Element::leaf(NS, "name", name))
}

#[allow(dead_code)]
pub fn album(name: &str, year: &str) -> Element {
    Element::new(NS, "album")
        .with_child(Element::leaf(NS, "name", name))
        .with_child(Element::leaf(NS, "year", year))
}

#[allow(dead_code)]
pub fn library(artists: Vec<Element>) -> Element {
    Element::new(NS, "library").with_children(artists)
}

/// Set the NETCONF `operation` attribute
#[allow(dead_code)]
pub fn with_op(element: Element, operation: &str) -> Element {
    element.with_attribute(Some(NETCONF_BASE_NS), "operation", operation)
}

#[allow(dead_code)]
pub fn qname(name: &str) -> QName {
    QName::new(NS, name)
}

/// Names of the artists under the first library element
#[allow(dead_code)]
pub fn artist_names(data: &[Element]) -> Vec<String> {
    data.iter()
        .filter(|element| element.is(NS, "library"))
        .flat_map(|library| library.children.iter())
        .filter(|element| element.is(NS, "artist"))
        .filter_map(|artist| artist.child_text(&qname("name")).map(str::to_string))
        .collect()
}

/// # Panics
///
/// Panics when the response carries errors
#[allow(dead_code)]
pub fn assert_ok(response: &NetconfResponse) {
    assert!(
        response.errors.is_empty(),
        "unexpected errors: {:?}",
        response.errors
    );
    assert!(response.ok);
}
