//! VoxChain node binary.
//!
//! Loads configuration, starts the node, logs a periodic status line, and
//! shuts down cleanly on Ctrl+C.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vox_node::{Node, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::load().context("failed to load configuration")?;
    info!(id = %config.id, "starting VoxChain node");

    let node = Node::new(config);
    node.start().await.context("failed to start node")?;

    // Periodic status line, useful when watching a small mesh by hand.
    {
        let node = node.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                ticker.tick().await;
                info!("{}", node.status().await);
            }
        });
    }

    info!("node is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await;
    Ok(())
}
