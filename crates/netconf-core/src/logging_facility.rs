//! Structured logging facility
//!
//! - One initialization point, [`init`], driven by a [`Profile`]
//! - Boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`) that
//!   emit the canonical field set from `netconf_core_types::schema`
//! - An in-memory capture layer for asserting on log output in tests
//!
//! # Usage
//!
//! ```rust
//! use netconf_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Only the request boundary (the server entry points) logs start/end pairs.
//! Code below it logs at debug level without the `event` field.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
