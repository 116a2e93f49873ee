//! Daemon wiring.

use anyhow::Context;
use scout_core::AppConfig;
use scout_db::Database;
use scout_rpc::{HttpIdentityProvider, HttpTransport, RpcChannel};
use scout_scanner::{ScanMetrics, ScanOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// The running daemon: database plus scan loop.
pub struct ScoutApp {
    db: Database,
    orchestrator: Arc<ScanOrchestrator>,
}

impl ScoutApp {
    /// Open the database and build the scan loop from `config`.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let db_path = config.database_path()?;
        let db = Database::new(&db_path)
            .await
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        db.run_migrations().await?;

        let transport = HttpTransport::new(config.rpc.timeout(), &config.rpc.user_agent)?;
        let identity = HttpIdentityProvider::new(config.rpc.identity_url.clone(), config.rpc.timeout())?;
        let channel = RpcChannel::new(Arc::new(transport), Arc::new(identity))
            .with_retry_budget(config.rpc.retry_budget);

        let store = Arc::new(db.world_store(config.storage.batch_size));
        let orchestrator = ScanOrchestrator::new(config, Arc::new(channel), store)?;

        info!(
            accounts = config.accounts.len(),
            locations = config.locations.len(),
            "Scout initialized"
        );

        Ok(Self {
            db,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Scan until `shutdown` is cancelled, then close the database.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let status = tokio::spawn(log_status(
            Arc::clone(self.orchestrator.metrics()),
            shutdown.clone(),
        ));

        self.orchestrator.run(shutdown.clone()).await;
        shutdown.cancel();
        status.await.context("status task failed")?;

        let counts = self.db.counts().await?;
        info!(
            sightings = counts.sightings,
            waypoints = counts.waypoints,
            zones = counts.zones,
            "Closing database"
        );
        self.db.close().await;
        Ok(())
    }
}

async fn log_status(metrics: Arc<ScanMetrics>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(STATUS_INTERVAL) => {
                match serde_json::to_string(&metrics.snapshot()) {
                    Ok(status) => debug!("Scan status: {}", status),
                    Err(e) => debug!("Failed to serialize scan status: {}", e),
                }
            }
        }
    }
}
