//! Registrar - persisted key/value service for roslite
//!
//! # Usage
//!
//! ```bash
//! registrar --atlas tcp://192.168.1.20:5555 --interface 192.168.1.21 store.json
//!
//! # Custom service and channel names
//! registrar --service settings --channel settings-updates store.json
//! ```
//!
//! The store is written back to its file when the process is signaled.

use std::path::PathBuf;
use std::process;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use registrar::{Registrar, RegistrarConfig};
use roslite::cli::{init_tracing, spawn_shutdown_listener, CommonArgs};
use roslite_node::{Node, DEFAULT_REGISTRAR};
use roslite_transport::Context;

/// roslite key/value registrar
#[derive(Parser, Debug)]
#[command(name = "registrar", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// JSON file the store is loaded from and saved to
    persistence_path: PathBuf,

    /// Service to provide
    #[arg(long, default_value = DEFAULT_REGISTRAR)]
    service: String,

    /// Channel new values are published on
    #[arg(long, default_value = DEFAULT_REGISTRAR)]
    channel: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.common.verbosity_level())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Registrar starting"
    );

    let cancel_token = CancellationToken::new();
    spawn_shutdown_listener(cancel_token.clone());

    let mut node = Node::connect(args.common.node_config(), Context::new(), cancel_token)
        .await
        .context("Failed to reach Atlas")?;

    let config = RegistrarConfig {
        persistence_path: args.persistence_path,
        service: args.service,
        channel: args.channel,
    };
    let registrar = Registrar::start(&config, &mut node)
        .await
        .context("Failed to start registrar")?;

    registrar.run().await.context("Registrar failed")?;
    Ok(())
}
