//! Parsed RPC requests and the reply they fill in

use netconf_core::edit::EditConfigRequest;
use netconf_core::errors::RpcError;
use netconf_core::xml::Element;
use netconf_core_types::SessionId;
use serde::{Deserialize, Serialize};

use crate::datastore::DataQuery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSessionRequest {}

/// `<get>`: always against running
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetRequest {
    pub filter: Option<Vec<Element>>,
    pub depth: Option<u32>,
}

impl GetRequest {
    pub fn query(&self) -> DataQuery {
        DataQuery {
            filter: self.filter.clone(),
            depth: self.depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetConfigRequest {
    pub source: String,
    pub filter: Option<Vec<Element>>,
    pub depth: Option<u32>,
}

impl GetConfigRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filter: None,
            depth: None,
        }
    }

    pub fn with_filter(mut self, fragments: Vec<Element>) -> Self {
        self.filter = Some(fragments);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn query(&self) -> DataQuery {
        DataQuery {
            filter: self.filter.clone(),
            depth: self.depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopySource {
    /// Another datastore by name
    Datastore(String),
    /// Inline `<config>` content
    Config(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyConfigRequest {
    pub target: String,
    pub source: CopySource,
}

/// Any request the server handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rpc", rename_all = "kebab-case")]
pub enum NetconfRequest {
    Lock(LockRequest),
    Unlock(UnlockRequest),
    KillSession(KillSessionRequest),
    CloseSession(CloseSessionRequest),
    Get(GetRequest),
    GetConfig(GetConfigRequest),
    EditConfig(EditConfigRequest),
    CopyConfig(CopyConfigRequest),
}

impl NetconfRequest {
    /// Operation name, as used in logs and permission checks
    pub fn name(&self) -> &'static str {
        match self {
            NetconfRequest::Lock(_) => "lock",
            NetconfRequest::Unlock(_) => "unlock",
            NetconfRequest::KillSession(_) => "kill-session",
            NetconfRequest::CloseSession(_) => "close-session",
            NetconfRequest::Get(_) => "get",
            NetconfRequest::GetConfig(_) => "get-config",
            NetconfRequest::EditConfig(_) => "edit-config",
            NetconfRequest::CopyConfig(_) => "copy-config",
        }
    }
}

/// `<rpc-reply>` content: data, `<ok/>`, or errors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetconfResponse {
    pub message_id: Option<String>,
    pub data: Vec<Element>,
    pub ok: bool,
    pub errors: Vec<RpcError>,
}

impl NetconfResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_message(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: RpcError) {
        self.ok = false;
        self.errors.push(error);
    }
}
