//! Command-line plumbing shared by every roslite binary.

use anyhow::Result;
use clap::{ArgAction, Args};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roslite_core::Address;
use roslite_node::NodeConfig;
use roslite_protocol::{WireCodec, WireMap};
use serde_json::Value;

/// Crates whose level follows the verbosity flags.
const LOG_TARGETS: &[&str] = &[
    "roslite",
    "roslite_core",
    "roslite_protocol",
    "roslite_transport",
    "atlas",
    "roslite_node",
    "registrar",
];

// ============================================================================
// Arguments
// ============================================================================

/// Arguments every roslite process takes.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Atlas discovery address, e.g. tcp://127.0.0.1:5555
    #[arg(long, env = "ROSLITE_ATLAS")]
    pub atlas: Address,

    /// Network interface this process declares to Atlas
    #[arg(long, env = "ROSLITE_INTERFACE")]
    pub interface: String,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Log verbosity level
    #[arg(
        long,
        env = "ROSLITE_VERBOSE",
        value_parser = parse_verbosity,
        default_value_t = 0
    )]
    pub verbosity: u8,
}

impl CommonArgs {
    /// Combined level from `-v` flags and `--verbosity`.
    pub fn verbosity_level(&self) -> u8 {
        self.verbose.saturating_add(self.verbosity)
    }

    /// Node settings for this process.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new(self.atlas.clone(), self.interface.clone())
    }
}

/// Parses a verbosity level.
///
/// Numbers are taken as is. Other values are flags: empty, `false`, `no`
/// and `off` mean 0, anything else means 1.
pub fn parse_verbosity(value: &str) -> Result<u8, String> {
    let value = value.trim();
    if let Ok(level) = value.parse::<u8>() {
        return Ok(level);
    }
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "off" => Ok(0),
        _ => Ok(1),
    }
}

/// Renders a received payload for display.
///
/// Wire maps and other encoded values become JSON. Anything else is shown
/// as its length and bytes.
pub fn render_payload(payload: &[u8]) -> String {
    if let Ok(map) = WireCodec.decode::<WireMap>(payload) {
        if let Ok(json) = serde_json::to_string(&map) {
            return json;
        }
    }
    match WireCodec.decode::<Value>(payload) {
        Ok(value) => value.to_string(),
        Err(_) => format!("<{} bytes> {}", payload.len(), payload.escape_ascii()),
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Maps a verbosity level to a tracing level name.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise every roslite crate logs at the
/// level `verbosity` selects. Logs go to stderr.
pub fn init_tracing(verbosity: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = level_for(verbosity);
            let mut filter = EnvFilter::new("warn");
            for target in LOG_TARGETS {
                filter = filter.add_directive(format!("{target}={level}").parse()?);
            }
            filter
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

// ============================================================================
// Signals
// ============================================================================

/// Waits for a shutdown signal (SIGTERM or SIGINT).
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

/// Cancels `cancel_token` once a shutdown signal arrives.
pub fn spawn_shutdown_listener(cancel_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        cancel_token.cancel();
    })
}
