//! Error types for the ipam2dns system
//!
//! This module defines all error types used throughout the crate.
//!
//! Reconciliation errors (`ZoneNotFound`, `Query`, `UpdateRejected`,
//! `UpdateTransport`) are always recoverable at lane granularity. Configuration
//! errors are startup-fatal and only ever raised while loading.

use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// Result type alias for ipam2dns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the ipam2dns system
#[derive(Error, Debug)]
pub enum Error {
    /// No configured zone covers the name
    #[error("no zone configured to handle {0}")]
    ZoneNotFound(String),

    /// The lookup of current record state failed (transport or unexpected rcode)
    #[error("query {name} against {server} failed: {message}")]
    Query {
        /// Queried name
        name: String,
        /// Server the query was sent to
        server: String,
        /// What went wrong
        message: String,
    },

    /// The authoritative server declined the signed update
    #[error("update of zone {zone} rejected with rcode {code}")]
    UpdateRejected {
        /// Zone the transaction was scoped to
        zone: String,
        /// Response code returned by the server
        code: ResponseCode,
    },

    /// The signed update could not be delivered (timeout, socket, signing)
    #[error("update of zone {zone} could not be sent: {message}")]
    UpdateTransport {
        /// Zone the transaction was scoped to
        zone: String,
        /// What went wrong
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Change source errors
    #[error("Change source error: {0}")]
    ChangeSource(String),

    /// Cursor store errors
    #[error("Cursor store error: {0}")]
    CursorStore(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "zone not found" error
    pub fn zone_not_found(name: impl Into<String>) -> Self {
        Self::ZoneNotFound(name.into())
    }

    /// Create a query error
    pub fn query(
        name: impl Into<String>,
        server: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Query {
            name: name.into(),
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create an update transport error
    pub fn update_transport(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpdateTransport {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a change source error
    pub fn change_source(msg: impl Into<String>) -> Self {
        Self::ChangeSource(msg.into())
    }

    /// Create a cursor store error
    pub fn cursor_store(msg: impl Into<String>) -> Self {
        Self::CursorStore(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error only skips the current lane (warning level)
    pub fn is_zone_miss(&self) -> bool {
        matches!(self, Self::ZoneNotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_rejected_display_names_zone_and_code() {
        let err = Error::UpdateRejected {
            zone: "example.com.".to_string(),
            code: ResponseCode::Refused,
        };
        let text = err.to_string();
        assert!(text.contains("example.com."));
        assert!(text.to_lowercase().contains("refused"));
    }

    #[test]
    fn test_zone_miss_classification() {
        assert!(Error::zone_not_found("host.example.org.").is_zone_miss());
        assert!(!Error::query("a.", "b", "c").is_zone_miss());
    }
}
