// # ipam2dnsd - IPAM to DNS sync daemon
//
// Thin integration layer: all sync and DNS logic lives in ipam2dns-core.
//
// The daemon is responsible for:
// 1. Parsing the command line and LOG_LEVEL
// 2. Loading the YAML configuration and building the zone registry
// 3. Wiring the change source (phpIPAM database or HTTP feed), RFC 2136
//    transport and cursor store
// 4. Running the sync engine until SIGINT/SIGTERM
//
// ## Example
//
// ```bash
// LOG_LEVEL=debug ipam2dnsd --config /etc/ipam2dns/config.yml \
//     --state /var/lib/ipam2dns/state.json
//
// # Full resync of the whole changelog, then exit
// ipam2dnsd --skip-state --once
// ```

use anyhow::{Context, Result};
use clap::Parser;
use ipam2dns_core::traits::ChangeSource;
use ipam2dns_core::{
    ChangeSourceSelection, EngineEvent, FileCursorStore, Reconciler, SyncConfig, SyncEngine,
    SyncOptions, ZoneRegistry,
};
use ipam2dns_rfc2136::Rfc2136Transport;
use ipam2dns_source_http::HttpChangeSource;
use ipam2dns_source_mysql::MySqlChangeSource;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ipam2dnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<Ipam2dnsExitCode> for ExitCode {
    fn from(code: Ipam2dnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep DNS A and PTR records in sync with an IPAM changelog
#[derive(Debug, Parser)]
#[command(name = "ipam2dnsd", version, about)]
struct Cli {
    /// Zone and change source configuration
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Resume cursor file
    #[arg(long, default_value = "state.json")]
    state: PathBuf,

    /// Ignore the stored cursor and replay the changelog from the start
    #[arg(long)]
    skip_state: bool,

    /// Process one batch and exit
    #[arg(long)]
    once: bool,
}

/// Map a LOG_LEVEL value to a tracing level
fn parse_log_level(value: &str) -> Result<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level_name = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_level = match parse_log_level(&level_name) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Ipam2dnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return Ipam2dnsExitCode::ConfigError.into();
    }

    info!("Starting ipam2dnsd {}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return Ipam2dnsExitCode::ConfigError.into();
        }
    };

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return Ipam2dnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let engine = match build_engine(&cli, config).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return Ipam2dnsExitCode::ConfigError;
            }
        };

        if let Err(e) = engine.run().await {
            error!("Daemon error: {}", e);
            Ipam2dnsExitCode::RuntimeError
        } else {
            Ipam2dnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Load and validate the configuration file
fn load_config(cli: &Cli) -> Result<SyncConfig> {
    let config = SyncConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    info!(
        "Configuration loaded: {} forward zone(s), {} reverse zone(s)",
        config.forward_zones.len(),
        config.reverse_zones.len()
    );
    Ok(config)
}

/// Wire the engine from its parts
async fn build_engine(cli: &Cli, config: SyncConfig) -> Result<SyncEngine> {
    let registry = Arc::new(ZoneRegistry::from_config(&config)?);
    for zone in registry.zones() {
        debug!("Zone {} via {} (key {})", zone.zone_name, zone.server, zone.key_name);
    }

    let transport = Arc::new(Rfc2136Transport::new(Duration::from_secs(
        config.engine.dns_timeout_secs,
    )));
    let reconciler = Reconciler::new(registry, transport);

    let source: Box<dyn ChangeSource> = match config.change_source()? {
        ChangeSourceSelection::Database(dsn) => Box::new(MySqlChangeSource::from_dsn(dsn)?),
        ChangeSourceSelection::Feed(feed) => Box::new(HttpChangeSource::from_config(feed)?),
    };
    info!("Change source: {}", source.source_name());

    let cursor_store = FileCursorStore::new(&cli.state)
        .await
        .with_context(|| format!("Failed to open state file {}", cli.state.display()))?;

    let options = SyncOptions {
        once: cli.once,
        skip_state: cli.skip_state,
    };

    let (engine, events) = SyncEngine::new(
        source,
        reconciler,
        Box::new(cursor_store),
        &config.engine,
        options,
    )?;

    tokio::spawn(log_events(events));

    Ok(engine)
}

/// Drain engine events into the debug log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::BatchFetched { events: 0, .. } => {}
            EngineEvent::ChangeProcessed {
                change_id,
                action,
                hostname,
                ip,
                success,
            } => {
                debug!(
                    "Change {} ({:?} {} {}): {}",
                    change_id,
                    action,
                    hostname,
                    ip,
                    if success { "ok" } else { "failed" }
                );
            }
            other => debug!("Engine event: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("verbose").is_err());
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ipam2dnsd"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yml"));
        assert_eq!(cli.state, PathBuf::from("state.json"));
        assert!(!cli.skip_state);
        assert!(!cli.once);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "ipam2dnsd",
            "--config",
            "/etc/ipam2dns/config.yml",
            "--skip-state",
            "--once",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/ipam2dns/config.yml"));
        assert!(cli.skip_state);
        assert!(cli.once);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Ipam2dnsExitCode::CleanShutdown as u8, 0);
        assert_eq!(Ipam2dnsExitCode::ConfigError as u8, 1);
        assert_eq!(Ipam2dnsExitCode::RuntimeError as u8, 2);
    }
}
