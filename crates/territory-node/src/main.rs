//! Territory Node binary
//!
//! Serves the claim ledger to viewers on a UDP port and accepts operator
//! commands on stdin.

use territory_node::{NodeConfig, TerritoryNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "territory_node=info,territory_sync=info,territory_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Territory Node");

    let config = NodeConfig::from_env();

    let node = TerritoryNode::new(config).await?;
    node.run().await?;

    Ok(())
}
