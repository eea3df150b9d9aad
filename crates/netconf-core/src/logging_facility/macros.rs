//! Boundary logging macros
//!
//! Every RPC entry point logs one `start` and exactly one of `end` /
//! `end_error`. Error events carry the wire tag and type of the error, so
//! logs and `<rpc-error>` replies can be matched up.

/// Log the start of an operation
///
/// ```
/// # use netconf_core::log_op_start;
/// log_op_start!("lock");
/// log_op_start!("lock", session_id = 7u32, datastore = "running");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use netconf_core::log_op_end;
/// log_op_end!("lock", duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed operation
///
/// `$err` is borrowed; anything convertible into `RpcError` works.
///
/// ```
/// # use netconf_core::{log_op_error, errors::NetconfError};
/// let err = NetconfError::DataMissing { path: "/a".to_string() };
/// log_op_error!("edit_config", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let rpc = $crate::errors::RpcError::from(::std::clone::Clone::clone(&$err));
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            "err.tag" = rpc.tag().code(),
            "err.type" = rpc.error_type().code(),
            message = rpc.message(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let rpc = $crate::errors::RpcError::from(::std::clone::Clone::clone(&$err));
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            "err.tag" = rpc.tag().code(),
            "err.type" = rpc.error_type().code(),
            message = rpc.message(),
            $($field)*
        );
    }};
}
