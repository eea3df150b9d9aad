//! NETCONF Core - request-processing kernel of a NETCONF server
//!
//! This crate holds the pieces every datastore operation is built from:
//! - `NodeId`: ordered, reversible identifiers for data nodes
//! - Subtree filters: parsing, canonical merging and selection
//! - The edit model and the change events derived from it
//! - Routing of change events to the subsystems that own the data
//! - The per-request cache in front of subsystem state queries
//! - The state walker that fills `get` replies with state data
//!
//! Wire parsing, transport and the YANG compiler live elsewhere: requests
//! arrive as parsed [`xml::Element`] trees and schema questions go through
//! [`schema::SchemaLookup`].

pub mod aggregator;
pub mod cache;
pub mod change;
pub mod change_router;
pub mod edit;
pub mod errors;
pub mod filter;
pub mod logging_facility;
pub mod node_id;
pub mod schema;
pub mod state;
pub mod subsystem;
pub mod validator;
pub mod xml;

pub use netconf_core_types as core_types;

// Re-export commonly used types
pub use aggregator::Aggregator;
pub use cache::ResponseCache;
pub use change::{derive_change_events, ChangeEvent, ChangeKind};
pub use change_router::{
    refine_config_change_notification, ChangeNotification, ChangeRouter, ConfigChangeNotification,
    ConfigChangeSink, NotificationMapping,
};
pub use edit::{DefaultOperation, EditConfigRequest, EditContainmentNode, EditOperation};
pub use errors::{ErrorTag, ErrorType, NetconfError, Result, RpcError};
pub use filter::{FilterMatchNode, FilterNode};
pub use node_id::{NodeId, Rdn};
pub use schema::{NamespaceContext, SchemaLookup, SchemaPath, StaticSchema};
pub use state::StateWalker;
pub use subsystem::{
    NoopSubsystem, StateAttributeQuery, StateAttributeResponse, Subsystem, SubsystemRegistry,
};
pub use validator::{NoopValidator, Validator};
pub use xml::{Element, QName};
