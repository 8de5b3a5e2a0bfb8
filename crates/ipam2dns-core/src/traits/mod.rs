//! Core traits for the ipam2dns system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsTransport`]: Query and update authoritative servers
//! - [`ChangeSource`]: Pull binding changes from the IPAM
//! - [`CursorStore`]: Persist the resume cursor

pub mod change_source;
pub mod cursor_store;
pub mod dns_transport;

pub use change_source::{ChangeAction, ChangeBatch, ChangeEvent, ChangeSource};
pub use cursor_store::CursorStore;
pub use dns_transport::{DnsTransport, QueryResponse};
