// # ipam2dns-core
//
// Core library for keeping DNS forward (A) and reverse (PTR) records in step
// with an IPAM changelog.
//
// ## Architecture Overview
//
// - **ZoneRegistry**: Authoritative zones with their servers and TSIG keys
// - **Reconciler**: Ensure/Delete of one hostname/IPv4 binding over two lanes
// - **DnsTransport**: Trait for live queries and signed RFC 2136 updates
// - **ChangeSource**: Trait for pulling ordered binding changes
// - **CursorStore**: Trait for persisting the resume cursor
// - **SyncEngine**: Polls the change source and drives the reconciler
//
// ## Design Principles
//
// 1. **Live state is the truth**: Every change re-queries DNS, nothing is cached
// 2. **Lane isolation**: A failing reverse update never blocks the forward one
// 3. **At-least-once**: The cursor only moves after a whole batch
// 4. **Library-First**: Transports and sources live in their own crates

pub mod changelog;
pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use changelog::ChangelogRow;
pub use config::{
    ChangeSourceSelection, EngineConfig, ServerDefinition, SourceConfig, SyncConfig,
};
pub use engine::{EngineEvent, SyncEngine, SyncOptions};
pub use error::{Error, Result};
pub use reconcile::{LaneOutcome, ReconcileReport, Reconciler, reverse_name};
pub use registry::{ZoneEntry, ZoneKind, ZoneRegistry};
pub use state::FileCursorStore;
pub use traits::{
    ChangeAction, ChangeBatch, ChangeEvent, ChangeSource, CursorStore, DnsTransport, QueryResponse,
};
