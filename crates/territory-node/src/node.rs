//! Territory Node - the main application entry point.
//!
//! Architecture:
//! - One authoritative claim ledger shared by every component
//! - UDP viewer endpoint that registers viewers and carries sync frames
//! - Sync scheduler pushing snapshots/deltas on a fixed cadence
//! - Stdin console for operator mutations

use std::net::SocketAddr;
use std::sync::Arc;

use territory_ledger::ClaimLedger;
use territory_sync::SyncScheduler;
use tokio::io::BufReader;
use tokio::sync::watch;

use crate::config::NodeConfig;
use crate::console;
use crate::viewers::UdpViewers;

/// A running territory node.
pub struct TerritoryNode {
    config: NodeConfig,
    ledger: Arc<ClaimLedger>,
    viewers: Arc<UdpViewers>,
    scheduler: Arc<SyncScheduler>,
}

impl TerritoryNode {
    /// Bind the viewer endpoint and assemble the node.
    pub async fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let ledger = Arc::new(ClaimLedger::new(config.ledger.clone()));
        let viewers = Arc::new(
            UdpViewers::bind(
                config.bind_addr,
                config.sndbuf,
                config.rcvbuf,
                config.viewer_timeout,
            )
            .await?
            .with_chunk_payload(config.chunk_payload),
        );
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&ledger),
            viewers.clone(),
            viewers.clone(),
            config.sync.clone(),
        ));

        Ok(Self {
            config,
            ledger,
            viewers,
            scheduler,
        })
    }

    pub fn ledger(&self) -> Arc<ClaimLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.viewers.local_addr()?)
    }

    /// Run until ctrl-c.
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            viewers = %self.local_addr()?,
            tick = ?self.config.sync.tick_interval,
            log_capacity = self.config.ledger.log_capacity,
            chunk_payload = self.config.chunk_payload,
            "Territory node starting"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let viewers = Arc::clone(&self.viewers);
        let scheduler = Arc::clone(&self.scheduler);
        let viewer_task = tokio::spawn(async move {
            viewers.serve(scheduler, shutdown_rx).await;
        });

        let ledger = self.ledger();
        let console_task = tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = console::run(stdin, ledger).await {
                tracing::error!(error = %e, "console input failed");
            }
            tracing::debug!("console input closed");
        });

        let sync = self.scheduler.start();

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");

        // Err only means the viewer task already exited.
        let _ = shutdown_tx.send(true);
        sync.stop().await?;
        viewer_task.await?;
        // stdin reads can not be cancelled cleanly
        console_task.abort();

        let stats = self.ledger.stats();
        tracing::info!(
            version = stats.version,
            claimed = stats.claimed_cells,
            "Territory node stopped"
        );
        Ok(())
    }
}
