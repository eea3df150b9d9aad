//! NETCONF Engine - datastore orchestration
//!
//! Wires the core pieces into named datastores with locking, edit
//! validation and rollback, and exposes the request entry points a NETCONF
//! server calls per RPC.

pub mod config;
pub mod datastore;
pub mod in_memory;
pub mod rpc;
pub mod server;

pub use config::{ConfigError, DatastoreConfig, ServerConfig};
pub use datastore::{DataQuery, Datastore, EditOutcome, LockState};
pub use in_memory::InMemoryAggregator;
pub use rpc::{
    CloseSessionRequest, CopyConfigRequest, CopySource, GetConfigRequest, GetRequest,
    KillSessionRequest, LockRequest, NetconfRequest, NetconfResponse, UnlockRequest,
};
pub use server::{NetconfServer, NetconfServerBuilder};
