//! Core types shared across the NETCONF crates
//!
//! This crate provides the foundational types used by both the error facility
//! and the logging facility:
//!
//! - **Correlation types**: RequestId, RequestContext
//! - **Client identity**: ClientInfo
//! - **Schema constants**: canonical log field keys and event names

pub mod client;
pub mod correlation;
pub mod schema;

pub use client::ClientInfo;
pub use correlation::{RequestContext, RequestId, SessionId};
