// # Cursor Store Trait
//
// Defines the interface for persisting the resume cursor: the highest
// changelog id whose batch has been fully processed.
//
// ## Purpose
//
// The cursor is saved only after a whole batch went through reconciliation.
// A crash mid-batch replays that batch on restart, which is safe because
// reconciliation is idempotent against live DNS state.
//
// ## Implementations
//
// - File-based: JSON file with atomic writes
// - Test doubles in `ipam2dns-core/tests`

use async_trait::async_trait;

/// Trait for cursor store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: Use async file operations, never blocking I/O
/// - **Write on change**: `save()` of an unchanged value must not touch storage
/// - **Explicit flush**: `flush()` must persist all pending changes
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Get the stored cursor, `0` when nothing was stored yet
    async fn load(&self) -> Result<u64, crate::Error>;

    /// Store a new cursor value
    async fn save(&self, cursor: u64) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
