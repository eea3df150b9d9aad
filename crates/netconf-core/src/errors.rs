use std::collections::BTreeMap;

use netconf_core_types::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using NetconfError
pub type Result<T> = std::result::Result<T, NetconfError>;

// ========== RPC Error Facility ==========

/// `error-type` layer as defined by RFC 6241 §4.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    Transport,
    Rpc,
    Protocol,
    Application,
}

impl ErrorType {
    /// Wire value of this error type
    pub fn code(&self) -> &'static str {
        match self {
            ErrorType::Transport => "transport",
            ErrorType::Rpc => "rpc",
            ErrorType::Protocol => "protocol",
            ErrorType::Application => "application",
        }
    }
}

/// `error-severity`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
}

impl ErrorSeverity {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorSeverity::Error => "error",
            ErrorSeverity::Warning => "warning",
        }
    }
}

/// Canonical `error-tag` taxonomy
///
/// Each tag maps to a stable wire code. Callers branch on the tag, never on
/// the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorTag {
    InUse,
    InvalidValue,
    TooBig,
    MissingAttribute,
    BadAttribute,
    UnknownAttribute,
    MissingElement,
    BadElement,
    UnknownElement,
    UnknownNamespace,
    AccessDenied,
    LockDenied,
    ResourceDenied,
    RollbackFailed,
    DataExists,
    DataMissing,
    OperationNotSupported,
    OperationFailed,
    MalformedMessage,
}

impl ErrorTag {
    /// Get the stable wire code for this tag
    pub fn code(&self) -> &'static str {
        match self {
            ErrorTag::InUse => "in-use",
            ErrorTag::InvalidValue => "invalid-value",
            ErrorTag::TooBig => "too-big",
            ErrorTag::MissingAttribute => "missing-attribute",
            ErrorTag::BadAttribute => "bad-attribute",
            ErrorTag::UnknownAttribute => "unknown-attribute",
            ErrorTag::MissingElement => "missing-element",
            ErrorTag::BadElement => "bad-element",
            ErrorTag::UnknownElement => "unknown-element",
            ErrorTag::UnknownNamespace => "unknown-namespace",
            ErrorTag::AccessDenied => "access-denied",
            ErrorTag::LockDenied => "lock-denied",
            ErrorTag::ResourceDenied => "resource-denied",
            ErrorTag::RollbackFailed => "rollback-failed",
            ErrorTag::DataExists => "data-exists",
            ErrorTag::DataMissing => "data-missing",
            ErrorTag::OperationNotSupported => "operation-not-supported",
            ErrorTag::OperationFailed => "operation-failed",
            ErrorTag::MalformedMessage => "malformed-message",
        }
    }
}

/// Ready-to-serialize `<rpc-error>` descriptor
///
/// This is what crosses the request boundary. Every `NetconfError` converts
/// into exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    tag: ErrorTag,
    error_type: ErrorType,
    severity: ErrorSeverity,
    app_tag: Option<String>,
    path: Option<String>,
    message: String,
    info: BTreeMap<String, String>,
    session_id: Option<SessionId>,
}

impl RpcError {
    /// Create a new error of severity `error`
    pub fn new(tag: ErrorTag, error_type: ErrorType) -> Self {
        Self {
            tag,
            error_type,
            severity: ErrorSeverity::Error,
            app_tag: None,
            path: None,
            message: String::new(),
            info: BTreeMap::new(),
            session_id: None,
        }
    }

    /// Shorthand for the common application-layer operation-failed
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorTag::OperationFailed, ErrorType::Application).with_message(message)
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_app_tag(mut self, app_tag: impl Into<String>) -> Self {
        self.app_tag = Some(app_tag.into());
        self
    }

    /// Add the `error-path` (an XPath-like rendering of the offending node)
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add one `error-info` child
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// Add the `session-id` error-info used by lock-denied / in-use
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn tag(&self) -> ErrorTag {
        self.tag
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn app_tag(&self) -> Option<&str> {
        self.app_tag.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}]", self.error_type.code(), self.tag.code())?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(session_id) = self.session_id {
            write!(f, " (session-id: {})", session_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

// ========== End RPC Error Facility ==========

/// Error taxonomy for the request-processing core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetconfError {
    // ===== Lock Errors =====
    /// The datastore carries edits that were never committed
    #[error("Lock on {datastore} denied: datastore has uncommitted changes")]
    LockDeniedUncommittedChanges { datastore: String },

    /// A confirmed commit is waiting for confirmation
    #[error("Lock on {datastore} denied: confirmed commit is pending")]
    LockDeniedConfirmedCommit { datastore: String },

    /// The target is locked by someone else
    #[error("{operation} on {datastore} denied: locked by session {owner}")]
    LockedByOtherSession {
        datastore: String,
        owner: SessionId,
        operation: String,
    },

    /// Unlock requested by a session that does not hold the lock
    #[error("Session {session_id} does not hold the lock on {datastore}")]
    NotLockedBySession {
        datastore: String,
        session_id: SessionId,
    },

    /// No datastore with this name
    #[error("Invalid target datastore: {datastore}")]
    InvalidTargetDatastore { datastore: String },

    // ===== Edit Errors =====
    /// Same type and key set appear twice under one parent
    #[error("Duplicate sibling element: {path}")]
    DuplicateSibling { path: String },

    /// delete targeting data that is not there
    #[error("Data missing: {path}")]
    DataMissing { path: String },

    /// create targeting data that is already there
    #[error("Data exists: {path}")]
    DataExists { path: String },

    /// A list entry was supplied without one of its keys
    #[error("Mandatory attribute {attribute} missing under {path}")]
    MandatoryAttributeMissing { path: String, attribute: String },

    /// An attribute value the edit model does not understand
    #[error("Bad attribute {attribute}='{value}' on <{element}>")]
    BadAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    /// An element whose namespace cannot be determined
    #[error("Unknown namespace for <{element}>")]
    UnknownNamespace { element: String },

    /// Generic constraint violation
    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    // ===== Copy Errors =====
    /// The source datastore's get-config failed
    #[error("Copy-config failed: {source_error}")]
    CopyConfig { source_error: Box<RpcError> },

    // ===== Access Errors =====
    #[error("Access denied for user {user} on operation {operation}")]
    AccessDenied { operation: String, user: String },

    // ===== Validation Errors =====
    /// The post-edit validator rejected the edit
    #[error("Validation failed: {error}")]
    Validation { error: Box<RpcError> },

    /// A subsystem failed while answering a state query
    #[error("Subsystem {subsystem} failed: {error}")]
    Subsystem {
        subsystem: String,
        error: Box<RpcError>,
    },

    // ===== Filter / Identity Errors =====
    /// Filter XML that cannot be turned into a filter tree
    #[error("Malformed filter: {reason}")]
    MalformedFilter { reason: String },

    /// merge() called on two nodes of different type
    #[error("Cannot merge filter node {left} with {right}: different types")]
    FilterTypeMismatch { left: String, right: String },

    /// merge() called on two instances with different match sets
    #[error("Cannot merge filter node {node}: match nodes differ")]
    FilterNotMergeable { node: String },

    /// Flat string that does not decode into a NodeId
    #[error("Invalid node id '{input}': {reason}")]
    InvalidNodeId { input: String, reason: String },

    // ===== Generic Errors =====
    /// Unexpected failure caught at the request boundary
    #[error("Internal error ({class}): {detail}")]
    Internal {
        class: String,
        detail: String,
        /// Panic location and stack, already truncated; empty when unknown
        trace: String,
    },
}

impl NetconfError {
    /// Wrap an RPC error produced by the validator
    pub fn validation(error: RpcError) -> Self {
        NetconfError::Validation {
            error: Box::new(error),
        }
    }

    /// Wrap the error a source datastore returned during copy-config
    pub fn copy_config(source_error: RpcError) -> Self {
        NetconfError::CopyConfig {
            source_error: Box::new(source_error),
        }
    }

    /// Convenience accessor for the wire tag this error maps to
    pub fn tag(&self) -> ErrorTag {
        RpcError::from(self.clone()).tag()
    }
}

/// Conversion from NetconfError to RpcError
///
/// This is the one place where domain errors pick up their wire tag, type and
/// error-info.
impl From<NetconfError> for RpcError {
    fn from(err: NetconfError) -> Self {
        let message = err.to_string();
        match err {
            NetconfError::LockDeniedUncommittedChanges { datastore } => {
                RpcError::new(ErrorTag::LockDenied, ErrorType::Protocol)
                    .with_message(message)
                    .with_info("datastore", datastore)
                    // RFC 6241 §7.5: no session holds it, so session-id is 0
                    .with_session_id(0)
            }

            NetconfError::LockDeniedConfirmedCommit { datastore } => {
                RpcError::new(ErrorTag::LockDenied, ErrorType::Protocol)
                    .with_message(message)
                    .with_info("datastore", datastore)
                    .with_session_id(0)
            }

            NetconfError::LockedByOtherSession {
                datastore,
                owner,
                operation,
            } => {
                let tag = if operation == "lock" {
                    ErrorTag::LockDenied
                } else {
                    ErrorTag::InUse
                };
                RpcError::new(tag, ErrorType::Protocol)
                    .with_message(message)
                    .with_info("datastore", datastore)
                    .with_session_id(owner)
            }

            NetconfError::NotLockedBySession {
                datastore,
                session_id,
            } => RpcError::new(ErrorTag::OperationFailed, ErrorType::Protocol)
                .with_message(message)
                .with_info("datastore", datastore)
                .with_session_id(session_id),

            NetconfError::InvalidTargetDatastore { datastore } => {
                RpcError::new(ErrorTag::InvalidValue, ErrorType::Protocol)
                    .with_message(message)
                    .with_info("datastore", datastore)
            }

            NetconfError::DuplicateSibling { path } => {
                RpcError::new(ErrorTag::OperationFailed, ErrorType::Application)
                    .with_app_tag("data-not-unique")
                    .with_message(message)
                    .with_path(path)
            }

            NetconfError::DataMissing { path } => {
                RpcError::new(ErrorTag::DataMissing, ErrorType::Application)
                    .with_message(message)
                    .with_path(path)
            }

            NetconfError::DataExists { path } => {
                RpcError::new(ErrorTag::DataExists, ErrorType::Application)
                    .with_message(message)
                    .with_path(path)
            }

            NetconfError::MandatoryAttributeMissing { path, attribute } => {
                RpcError::new(ErrorTag::MissingElement, ErrorType::Application)
                    .with_message(message)
                    .with_path(path)
                    .with_info("bad-element", attribute)
            }

            NetconfError::BadAttribute {
                element, attribute, ..
            } => RpcError::new(ErrorTag::BadAttribute, ErrorType::Protocol)
                .with_message(message)
                .with_info("bad-attribute", attribute)
                .with_info("bad-element", element),

            NetconfError::UnknownNamespace { element } => {
                RpcError::new(ErrorTag::UnknownNamespace, ErrorType::Protocol)
                    .with_message(message)
                    .with_info("bad-element", element)
            }

            NetconfError::OperationFailed { .. } => {
                RpcError::new(ErrorTag::OperationFailed, ErrorType::Application)
                    .with_message(message)
            }

            // The source's payload goes out as-is
            NetconfError::CopyConfig { source_error } => *source_error,

            NetconfError::AccessDenied { operation, user } => {
                RpcError::new(ErrorTag::AccessDenied, ErrorType::Application)
                    .with_message(message)
                    .with_info("operation", operation)
                    .with_info("user", user)
            }

            NetconfError::Validation { error } => *error,

            NetconfError::Subsystem { subsystem, error } => {
                let rpc = if error.message().is_empty() {
                    (*error).with_message(format!("Subsystem {} failed", subsystem))
                } else {
                    *error
                };
                rpc.with_info("subsystem", subsystem)
            }

            NetconfError::MalformedFilter { .. }
            | NetconfError::FilterTypeMismatch { .. }
            | NetconfError::FilterNotMergeable { .. } => {
                RpcError::new(ErrorTag::OperationFailed, ErrorType::Application)
                    .with_message(message)
            }

            NetconfError::InvalidNodeId { .. } => {
                RpcError::new(ErrorTag::InvalidValue, ErrorType::Application)
                    .with_message(message)
            }

            NetconfError::Internal { class, trace, .. } => {
                let rpc = RpcError::new(ErrorTag::OperationFailed, ErrorType::Application)
                    .with_message(message)
                    .with_info("error-class", class);
                if trace.is_empty() {
                    rpc
                } else {
                    rpc.with_info("stack-trace", trace)
                }
            }
        }
    }
}
