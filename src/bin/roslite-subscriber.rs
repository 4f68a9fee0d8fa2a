//! roslite-subscriber - print every message published on a channel
//!
//! # Usage
//!
//! ```bash
//! # Watch registrar updates
//! roslite-subscriber registrar
//!
//! # Stop after ten messages
//! roslite-subscriber -n 10 temperature
//! ```
//!
//! Wire-encoded messages are printed as JSON, with integer map keys as
//! strings. Any other payload is printed as its length and bytes.

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use roslite::cli::{init_tracing, render_payload, spawn_shutdown_listener, CommonArgs};
use roslite_node::{Node, NodeError};
use roslite_transport::Context;

/// Subscribe to a roslite channel
#[derive(Parser, Debug)]
#[command(name = "roslite-subscriber", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Channel to subscribe to
    channel: String,

    /// Number of messages to print; 0 prints until interrupted
    #[arg(short = 'n', long, default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.common.verbosity_level())?;

    let cancel_token = CancellationToken::new();
    spawn_shutdown_listener(cancel_token.clone());

    let mut node = Node::connect(args.common.node_config(), Context::new(), cancel_token)
        .await
        .context("Failed to reach Atlas")?;
    let mut subscriber = match node.subscribe(&args.channel).await {
        Ok(subscriber) => subscriber,
        Err(NodeError::Interrupted) => return Ok(()),
        Err(e) => return Err(e).context("Failed to resolve channel"),
    };
    info!(channel = %args.channel, "Subscribed");

    let mut received: u64 = 0;
    loop {
        let payload = match subscriber.recv().await {
            Ok(payload) => payload,
            Err(NodeError::Interrupted) => break,
            Err(e) => return Err(e).context("Subscription failed"),
        };
        received += 1;
        debug!(channel = %args.channel, bytes = payload.len(), received, "Message received");

        println!("{}", render_payload(&payload));

        if args.count > 0 && received >= args.count {
            break;
        }
    }

    info!(channel = %args.channel, received, "Subscriber stopped");
    Ok(())
}
