// # Change Source Trait
//
// Defines the interface for pulling ordered binding changes out of the IPAM.
//
// ## Implementations
//
// - HTTP changelog feed: `ipam2dns-source-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ipam2dns_core::ChangeSource;
//
// let batch = source.fetch_changes(cursor).await?;
// for event in &batch.events {
//     println!("{} {:?} {} {}", event.change_id, event.action, event.hostname, event.ip);
// }
// cursor = batch.high_water;
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Direction of a binding change
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Make the forward and reverse records exist
    Ensure,
    /// Remove the forward and reverse records
    Delete,
}

impl ChangeAction {
    /// Map a changelog verb to an action
    ///
    /// `add` and `edit` ensure, `delete` deletes, everything else is ignored.
    pub fn from_changelog(verb: &str) -> Option<Self> {
        match verb.trim().to_ascii_lowercase().as_str() {
            "add" | "edit" => Some(Self::Ensure),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One binding change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Monotonic changelog id
    pub change_id: u64,
    /// What to do with the binding
    pub action: ChangeAction,
    /// Hostname as recorded in the IPAM, may be empty for deletes
    pub hostname: String,
    /// Bound address
    pub ip: Ipv4Addr,
}

impl ChangeEvent {
    /// Create a new change event
    pub fn new(
        change_id: u64,
        action: ChangeAction,
        hostname: impl Into<String>,
        ip: Ipv4Addr,
    ) -> Self {
        Self {
            change_id,
            action,
            hostname: hostname.into(),
            ip,
        }
    }
}

/// Changes newer than a cursor, in increasing change id order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Relevant events
    pub events: Vec<ChangeEvent>,
    /// Cursor to persist once every event has been processed
    ///
    /// Can be larger than the last event id: irrelevant changelog rows are
    /// skipped but still consumed.
    pub high_water: u64,
}

/// Trait for change source implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O against the IPAM (HTTP, database)
/// - ✅ Parse and filter changelog rows
///
/// ## Forbidden Capabilities
/// - ❌ Perform DNS queries or updates (owned by the reconciliation engine)
/// - ❌ Persist the cursor (owned by `SyncEngine` via `CursorStore`)
/// - ❌ Retry or sleep (owned by `SyncEngine`)
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Fetch every change with an id greater than `after`
    ///
    /// # Returns
    ///
    /// - `Ok(ChangeBatch)`: events in increasing id order and the new cursor
    /// - `Err(Error)`: the IPAM could not be read; the cursor must not move
    async fn fetch_changes(&self, after: u64) -> Result<ChangeBatch, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
