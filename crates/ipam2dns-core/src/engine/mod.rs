//! Changelog sync engine
//!
//! The SyncEngine is responsible for:
//! - Polling the ChangeSource for changes after the resume cursor
//! - Running each change through the Reconciler
//! - Persisting the cursor once a batch has been processed
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ ChangeSource │─── ChangeBatch ───┐
//! └──────────────┘                   │
//!                                    ▼
//!                           ┌──────────────┐
//!                           │  SyncEngine  │
//!                           └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌──────────────┐          ┌──────────────┐          ┌──────────────┐
//! │  Reconciler  │          │ CursorStore  │          │    Events    │
//! │ (PTR + A)    │          │ (high water) │          │   (notify)   │
//! └──────────────┘          └──────────────┘          └──────────────┘
//! ```
//!
//! ## Delivery
//!
//! The cursor only moves after every event of a batch went through the
//! reconciler, so changes are delivered at least once. A batch cut short by
//! shutdown or a crash is fetched again on the next start.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::traits::{ChangeAction, ChangeSource, CursorStore};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started from `cursor`
    Started { cursor: u64 },

    /// A batch was fetched from the change source
    BatchFetched {
        after: u64,
        events: usize,
        high_water: u64,
    },

    /// One change went through both lanes
    ChangeProcessed {
        change_id: u64,
        action: ChangeAction,
        hostname: String,
        ip: Ipv4Addr,
        success: bool,
    },

    /// The cursor was persisted
    CursorSaved { cursor: u64 },

    /// Fetching from the change source failed, the cursor was kept
    FetchFailed { cursor: u64, error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Run-mode switches, usually from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Process a single batch, then stop
    pub once: bool,

    /// Ignore the stored cursor and start from 0
    pub skip_state: bool,
}

/// Changelog sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Engine polls until a shutdown signal arrives (or after one batch in
///    `once` mode)
/// 4. The cursor store is flushed before `run()` returns
///
/// ## Load Resistance
///
/// - **Bounded event channel**: monitoring can never grow memory unbounded
/// - **Event dropping**: when the channel is full, new events are dropped (logged)
pub struct SyncEngine {
    /// Where changes come from
    source: Box<dyn ChangeSource>,

    /// Applies changes to DNS
    reconciler: Reconciler,

    /// Resume cursor persistence
    cursor_store: Box<dyn CursorStore>,

    /// Pause between polls
    poll_interval: Duration,

    options: SyncOptions,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn ChangeSource>,
        reconciler: Reconciler,
        cursor_store: Box<dyn CursorStore>,
        config: &EngineConfig,
        options: SyncOptions,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            source,
            reconciler,
            cursor_store,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            options,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until SIGINT/SIGTERM (or one batch in `once` mode)
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The cursor could not be loaded or flushed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// With `None` this behaves like [`run()`](Self::run). A dropped sender
    /// counts as a shutdown request.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let mut cursor = if self.options.skip_state {
            info!("Ignoring stored cursor, starting from 0");
            0
        } else {
            self.cursor_store.load().await?
        };

        info!(
            "Sync engine started at cursor {} (source: {}, zones: {})",
            cursor,
            self.source.source_name(),
            self.reconciler.registry().len()
        );
        self.emit_event(EngineEvent::Started { cursor });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => wait_for_signal().await,
            }
        };
        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break "Shutdown signal",

                next = self.poll_once(cursor) => cursor = next,
            }

            if self.options.once {
                break "Single batch processed";
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => break "Shutdown signal",

                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        };

        info!("{}, stopping at cursor {}", reason, cursor);
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });

        // Flush cursor before exiting
        self.cursor_store.flush().await?;
        info!("Cursor flushed, engine stopped");

        Ok(())
    }

    /// Fetch and process one batch, returning the cursor to continue from
    async fn poll_once(&self, cursor: u64) -> u64 {
        let batch = match self.source.fetch_changes(cursor).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(
                    "Failed to fetch changes from {} after {}: {}",
                    self.source.source_name(),
                    cursor,
                    e
                );
                self.emit_event(EngineEvent::FetchFailed {
                    cursor,
                    error: e.to_string(),
                });
                return cursor;
            }
        };

        if !batch.events.is_empty() {
            debug!(
                "Fetched {} changes after {} (high water {})",
                batch.events.len(),
                cursor,
                batch.high_water
            );
        }
        self.emit_event(EngineEvent::BatchFetched {
            after: cursor,
            events: batch.events.len(),
            high_water: batch.high_water,
        });

        for event in &batch.events {
            let report = self.reconciler.apply_change(event).await;
            self.emit_event(EngineEvent::ChangeProcessed {
                change_id: event.change_id,
                action: event.action,
                hostname: report.hostname.clone(),
                ip: event.ip,
                success: report.is_success(),
            });
        }

        let next = batch.high_water.max(cursor);
        match self.cursor_store.save(next).await {
            Ok(()) => {
                if next != cursor {
                    debug!("Cursor advanced to {}", next);
                    self.emit_event(EngineEvent::CursorSaved { cursor: next });
                }
            }
            Err(e) => {
                // The batch is replayed after a restart
                error!("Failed to save cursor {}: {}", next, e);
            }
        }

        next
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_equality() {
        let event = EngineEvent::ChangeProcessed {
            change_id: 7,
            action: ChangeAction::Ensure,
            hostname: "host.example.com.".to_string(),
            ip: Ipv4Addr::new(192, 0, 2, 10),
            success: true,
        };

        assert_eq!(event.clone(), event);
        assert_ne!(event, EngineEvent::CursorSaved { cursor: 7 });
    }

    #[test]
    fn test_default_options_poll_forever_from_stored_cursor() {
        let options = SyncOptions::default();
        assert!(!options.once);
        assert!(!options.skip_state);
    }
}
