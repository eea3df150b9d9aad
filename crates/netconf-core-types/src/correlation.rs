//! Correlation types for request tracking
//!
//! Every inbound NETCONF RPC gets a [`RequestContext`] at the server boundary.
//! The request id is attached to log events so a `get` and the subsystem calls
//! it fans out to can be tied together.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// NETCONF session identifier as assigned by the transport layer
pub type SessionId = u32;

/// Unique identifier for a single inbound RPC
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random RequestId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (e.g. a client supplied message-id)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried through one RPC
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub session_id: SessionId,
    /// The `message-id` attribute of the `<rpc>`, when the caller has one
    pub message_id: Option<String>,
}

impl RequestContext {
    /// Create a new context with a fresh RequestId
    pub fn new(session_id: SessionId) -> Self {
        Self {
            request_id: RequestId::new(),
            session_id,
            message_id: None,
        }
    }

    /// Attach the rpc message-id
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}
