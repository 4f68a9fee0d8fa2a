//! Atlas - the roslite discovery broker
//!
//! Binds the discovery endpoint, answers lookups and forwards traffic for
//! every channel and service proxy until signaled.
//!
//! # Usage
//!
//! ```bash
//! atlas --atlas tcp://0.0.0.0:5555 --interface 192.168.1.20 -v
//!
//! # Same, from the environment
//! ROSLITE_ATLAS=tcp://0.0.0.0:5555 ROSLITE_INTERFACE=192.168.1.20 atlas
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use atlas::{Atlas, AtlasConfig, DEFAULT_IPC_DIR};
use roslite::cli::{init_tracing, spawn_shutdown_listener, CommonArgs};
use roslite_transport::Context;

/// roslite discovery broker
#[derive(Parser, Debug)]
#[command(name = "atlas", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Directory for local-IPC endpoint files
    #[arg(long, env = "ROSLITE_IPC_DIR", default_value = DEFAULT_IPC_DIR)]
    ipc_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.common.verbosity_level())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Atlas starting"
    );

    let cancel_token = CancellationToken::new();
    spawn_shutdown_listener(cancel_token.clone());

    let config = AtlasConfig::new(args.common.atlas.clone(), args.common.interface.clone())
        .with_ipc_dir(args.ipc_dir);
    let mut atlas = Atlas::bind(config, Context::new(), cancel_token)
        .await
        .with_context(|| format!("Failed to bind Atlas at {}", args.common.atlas))?;

    atlas.run().await;

    info!(proxies = atlas.registry().len(), "Atlas stopped");
    Ok(())
}
