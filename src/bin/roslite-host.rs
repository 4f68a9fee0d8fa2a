//! roslite-host - Atlas and the registrar in one process
//!
//! Both share one transport context, so the registrar reaches its proxies
//! over the in-process transport.
//!
//! # Usage
//!
//! ```bash
//! roslite-host --atlas tcp://0.0.0.0:5555 --interface 192.168.1.20
//!
//! # Persist registrar values
//! roslite-host --persistence-path /var/lib/roslite/store.json
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use atlas::{Atlas, AtlasConfig, DEFAULT_IPC_DIR};
use registrar::{Registrar, RegistrarConfig};
use roslite::cli::{init_tracing, spawn_shutdown_listener, CommonArgs};
use roslite_node::{Node, NodeConfig};
use roslite_transport::Context;

/// Atlas and registrar in one process
#[derive(Parser, Debug)]
#[command(name = "roslite-host", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Registrar persistence file
    #[arg(long, default_value = "/dev/null")]
    persistence_path: PathBuf,

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
        "roslite host starting"
    );

    let cancel_token = CancellationToken::new();
    spawn_shutdown_listener(cancel_token.clone());
    let context = Context::new();

    let config = AtlasConfig::new(args.common.atlas.clone(), args.common.interface.clone())
        .with_ipc_dir(args.ipc_dir);
    let mut atlas = Atlas::bind(config, context.clone(), cancel_token.clone())
        .await
        .with_context(|| format!("Failed to bind Atlas at {}", args.common.atlas))?;
    let atlas_address = atlas.local_address().clone();
    let atlas_task = tokio::spawn(async move { atlas.run().await });

    let node_config = NodeConfig::new(atlas_address, args.common.interface.clone());
    let mut node = Node::connect(node_config, context, cancel_token.clone())
        .await
        .context("Failed to reach Atlas")?;
    let registrar = Registrar::start(&RegistrarConfig::new(args.persistence_path), &mut node)
        .await
        .context("Failed to start registrar")?;

    let registrar_result = registrar.run().await;
    if let Err(e) = &registrar_result {
        error!(error = %e, "Registrar failed");
        cancel_token.cancel();
    }

    atlas_task.await.context("Atlas task failed")?;
    drop(node);

    info!("roslite host stopped");
    registrar_result.context("Registrar failed")
}
