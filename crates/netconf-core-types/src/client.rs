//! Identity of the client behind an RPC

use serde::{Deserialize, Serialize};

use crate::correlation::SessionId;

/// Who is asking
///
/// Built by the transport layer once per session and passed by reference to
/// every datastore operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub session_id: SessionId,
    pub username: String,
    /// Skip subsystem permission checks (internal sessions)
    #[serde(default)]
    pub bypass_authorization: bool,
}

impl ClientInfo {
    pub fn new(session_id: SessionId, username: impl Into<String>) -> Self {
        Self {
            session_id,
            username: username.into(),
            bypass_authorization: false,
        }
    }

    /// An internal client that is never subject to permission checks
    pub fn internal(session_id: SessionId) -> Self {
        Self {
            session_id,
            username: "internal".to_string(),
            bypass_authorization: true,
        }
    }
}
