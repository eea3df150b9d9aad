//! Canonical schema constants for structured logging
//!
//! These constants keep field names consistent across the core and engine.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_SESSION_ID: &str = "session_id";

// Protocol identifiers
pub const FIELD_DATASTORE: &str = "datastore";
pub const FIELD_NODE_ID: &str = "node_id";
pub const FIELD_SUBSYSTEM: &str = "subsystem";

// Error fields
pub const FIELD_ERR_TAG: &str = "err.tag";
pub const FIELD_ERR_TYPE: &str = "err.type";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
