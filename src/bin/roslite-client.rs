//! roslite-client - send a JSON request to a service and print the replies
//!
//! # Usage
//!
//! ```bash
//! # One request
//! roslite-client echo '{"n": 1}'
//!
//! # Every two seconds until interrupted
//! roslite-client -n 0 -w 2 echo '{"n": 1}'
//! ```

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use roslite::cli::{init_tracing, spawn_shutdown_listener, CommonArgs};
use roslite_node::{Node, NodeError};
use roslite_transport::Context;

/// Send a request to a roslite service
#[derive(Parser, Debug)]
#[command(name = "roslite-client", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Service to call
    service: String,

    /// Request body as JSON
    request: String,

    /// Number of requests to send; 0 or less sends forever
    #[arg(short = 'n', long, default_value_t = 1, allow_negative_numbers = true)]
    count: i64,

    /// Seconds to wait between requests
    #[arg(short = 'w', long, default_value_t = 1.0)]
    wait: f64,

    /// Milliseconds to wait for each reply
    #[arg(short = 't', long, default_value_t = 100)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.common.verbosity_level())?;

    let request: Value = serde_json::from_str(&args.request)
        .with_context(|| format!("Request is not valid JSON: {}", args.request))?;
    let wait = Duration::try_from_secs_f64(args.wait)
        .with_context(|| format!("Invalid wait: {}", args.wait))?;

    let cancel_token = CancellationToken::new();
    spawn_shutdown_listener(cancel_token.clone());

    let mut node = Node::connect(args.common.node_config(), Context::new(), cancel_token.clone())
        .await
        .context("Failed to reach Atlas")?;
    let mut requester = match node
        .request_service(&args.service, Duration::from_millis(args.timeout_ms))
        .await
    {
        Ok(requester) => requester,
        Err(NodeError::Interrupted) => return Ok(()),
        Err(e) => return Err(e).context("Failed to resolve service"),
    };

    let mut sent: i64 = 0;
    loop {
        match requester.request_message::<Value, Value>(&request).await {
            Ok(reply) => println!("{reply}"),
            Err(NodeError::Timeout { .. }) => warn!(service = %args.service, "No reply"),
            Err(NodeError::Interrupted) => break,
            Err(e) => return Err(e).context("Request failed"),
        }

        sent += 1;
        if args.count > 0 && sent >= args.count {
            break;
        }

        debug!(sent, "Waiting before next request");
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    Ok(())
}
