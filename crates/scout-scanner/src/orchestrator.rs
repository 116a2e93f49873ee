//! Scan cycle driver.
//!
//! The orchestrator loops over three phases. While there is nothing to scan it
//! stays [`ScanState::Idle`] and polls. A cycle enqueues one map request per
//! coverage point and waits for the queue to drain ([`ScanState::Scanning`]).
//! A restart request drops whatever is still queued ([`ScanState::Draining`])
//! and the next cycle starts from the updated coverage.

use crate::control::ScanControl;
use crate::error::Result;
use crate::metrics::{ScanMetrics, ScanState};
use crate::pool::{PoolSettings, WorkerPool};
use crate::queue::{CompletionHandler, StepOutcome, WorkItem, WorkQueue};
use crate::scheduler::AuthScheduler;
use async_trait::async_trait;
use scout_core::{now_millis, AccountConfig, AppConfig, Point, WorldStore};
use scout_geo::CoverageGenerator;
use scout_rpc::{world_snapshot, AccountSession, RequestStats, RpcChannel, SubRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Completed steps between two request statistics reports.
pub const STATS_REPORT_INTERVAL: usize = 20;

/// Workers needed for `accounts` accounts.
#[must_use]
pub fn worker_count(accounts: usize, accounts_per_worker: usize, min_workers: usize) -> usize {
    accounts
        .div_ceil(accounts_per_worker.max(1))
        .max(min_workers)
}

#[derive(Debug, Clone)]
struct LoopSettings {
    idle_poll: Duration,
    drain_check: Duration,
    min_scan_duration: Duration,
    accounts_per_worker: usize,
    min_workers: usize,
    endpoint: String,
}

enum CycleEnd {
    Completed,
    Restarted,
    Shutdown,
}

/// Stores the world state of every finished step and tracks progress.
struct CycleHandler {
    store: Arc<dyn WorldStore>,
    metrics: Arc<ScanMetrics>,
    stats: Arc<RequestStats>,
}

#[async_trait]
impl CompletionHandler for CycleHandler {
    async fn on_complete(&self, position: Point, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Success(envelope) => {
                let snapshot = world_snapshot(&envelope, now_millis());
                if let Err(e) = self.store.store(&snapshot).await {
                    error!("Failed to store map data for {}: {}", position, e);
                    self.metrics.record_processing_failure();
                    return;
                }
                debug!(
                    sightings = snapshot.sightings.len(),
                    waypoints = snapshot.waypoints.len(),
                    zones = snapshot.zones.len(),
                    "Stored map data for {}",
                    position
                );

                let completed = self.metrics.record_step_completed();
                info!("Completed {:5.2}% of scan.", self.metrics.progress_percent());
                if completed % STATS_REPORT_INTERVAL == 0 {
                    if let Some(report) = self.stats.report() {
                        info!("{}", report);
                    }
                    self.stats.reset();
                }
            }
            StepOutcome::Failed { attempts, reason } => {
                warn!(
                    "Map download failed for {} after {} attempts: {}",
                    position, attempts, reason
                );
                self.metrics.record_failed_step();
            }
        }
    }
}

/// Drives scan cycles over the coverage published by [`ScanControl`].
pub struct ScanOrchestrator {
    control: Arc<ScanControl>,
    scheduler: Arc<AuthScheduler>,
    queue: Arc<WorkQueue>,
    pool: WorkerPool,
    metrics: Arc<ScanMetrics>,
    stats: Arc<RequestStats>,
    store: Arc<dyn WorldStore>,
    settings: LoopSettings,
}

impl ScanOrchestrator {
    /// Build the orchestrator and its workers from `config`.
    ///
    /// Locations and accounts from `config` are loaded into the control; the
    /// first cycle picks them up.
    pub fn new(
        config: &AppConfig,
        channel: Arc<RpcChannel>,
        store: Arc<dyn WorldStore>,
    ) -> Result<Self> {
        let scanning = &config.scanning;
        let generator = CoverageGenerator::new(scanning.cell_radius_m)?;
        let control = Arc::new(ScanControl::new(generator, scanning.visit_order));
        control.set_locations(config.locations.clone())?;
        control.set_accounts(config.accounts.clone());

        let scheduler = Arc::new(AuthScheduler::new(scanning.scheduler_lookahead()));
        let queue = Arc::new(WorkQueue::new());
        let metrics = Arc::new(ScanMetrics::new());
        let stats = Arc::clone(channel.stats());
        let pool = WorkerPool::new(
            Arc::clone(&queue),
            Arc::clone(&scheduler),
            channel,
            Arc::clone(&metrics),
            PoolSettings::from_config(scanning),
        );

        Ok(Self {
            control,
            scheduler,
            queue,
            pool,
            metrics,
            stats,
            store,
            settings: LoopSettings {
                idle_poll: scanning.idle_poll(),
                drain_check: scanning.drain_check(),
                min_scan_duration: scanning.min_scan_duration(),
                accounts_per_worker: scanning.accounts_per_worker,
                min_workers: scanning.min_workers,
                endpoint: config.rpc.initial_endpoint.clone(),
            },
        })
    }

    /// Handle for changing locations and accounts at runtime.
    #[must_use]
    pub fn control(&self) -> &Arc<ScanControl> {
        &self.control
    }

    /// Live counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }

    /// Run scan cycles until `shutdown` is cancelled, then stop the workers.
    ///
    /// Calls in flight at shutdown are allowed to finish. Items still held by
    /// workers when a cycle is restarted are finished without being counted,
    /// stored or retried.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Scan loop started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if self.control.take_restart() {
                if let Some(accounts) = self.control.take_accounts_changed() {
                    self.apply_accounts(accounts).await;
                }
            }

            if !self.control.has_work() {
                self.metrics.set_state(ScanState::Idle);
                debug!("Nothing to scan, waiting for locations and accounts");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = self.control.wait_for_restart() => {}
                    () = tokio::time::sleep(self.settings.idle_poll) => {}
                }
                continue;
            }

            let started = Instant::now();
            match self.scan_cycle(&shutdown).await {
                CycleEnd::Shutdown => break,
                CycleEnd::Restarted => continue,
                CycleEnd::Completed => {}
            }

            let elapsed = started.elapsed();
            self.metrics.finish_cycle(elapsed);
            info!("Scan cycle completed in {:.2}s", elapsed.as_secs_f64());
            if let Some(report) = self.stats.report() {
                info!("{}", report);
            }
            self.stats.reset();

            if let Some(remaining) = self.settings.min_scan_duration.checked_sub(elapsed) {
                if !remaining.is_zero() {
                    self.metrics.set_state(ScanState::Idle);
                    info!("Waiting {:.1}s before the next scan", remaining.as_secs_f64());
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = self.control.wait_for_restart() => {
                            info!("Scan targets changed, starting the next scan now");
                        }
                        () = tokio::time::sleep(remaining) => {}
                    }
                }
            }
        }

        self.metrics.set_state(ScanState::Idle);
        self.pool.stop().await;
        info!("Scan loop stopped");
    }

    async fn apply_accounts(&self, accounts: Vec<AccountConfig>) {
        let count = accounts.len();
        let workers = worker_count(
            count,
            self.settings.accounts_per_worker,
            self.settings.min_workers,
        );
        self.pool.resize(workers).await;

        let endpoint = &self.settings.endpoint;
        let sessions = accounts
            .into_iter()
            .map(|account| AccountSession::new(account, endpoint.clone()));
        self.scheduler.replace_accounts(sessions).await;

        self.metrics.set_active(workers, count);
        info!("Scanning with {} workers and {} accounts", workers, count);
    }

    async fn scan_cycle(&self, shutdown: &CancellationToken) -> CycleEnd {
        let coverage = self.control.coverage();
        self.metrics.set_state(ScanState::Scanning);
        self.metrics.begin_cycle(coverage.len());
        info!("Starting scan of {} points", coverage.len());

        let handler: Arc<dyn CompletionHandler> = Arc::new(CycleHandler {
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
            stats: Arc::clone(&self.stats),
        });
        for point in coverage.iter() {
            let item = WorkItem::new(SubRequest::scan_chain(*point), *point, Arc::clone(&handler));
            self.queue.push(item).await;
        }

        loop {
            tokio::select! {
                () = shutdown.cancelled() => return CycleEnd::Shutdown,
                () = self.queue.wait_until_done() => return CycleEnd::Completed,
                () = tokio::time::sleep(self.settings.drain_check) => {
                    if self.control.restart_requested() {
                        self.metrics.set_state(ScanState::Draining);
                        let dropped = self.queue.clear().await;
                        info!("Restarting scan, dropped {} pending steps", dropped);
                        return CycleEnd::Restarted;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_rpc::ParsedEnvelope;
    use std::collections::BTreeMap;

    struct DiscardStore;

    #[async_trait]
    impl WorldStore for DiscardStore {
        async fn store(&self, _snapshot: &scout_core::WorldSnapshot) -> scout_core::Result<()> {
            Ok(())
        }
    }

    fn empty_envelope() -> ParsedEnvelope {
        ParsedEnvelope {
            status_code: 1,
            api_url: None,
            responses: BTreeMap::new(),
            returned: 0,
        }
    }

    #[tokio::test]
    async fn test_stats_window_resets_after_each_report() {
        let metrics = Arc::new(ScanMetrics::new());
        let stats = Arc::new(RequestStats::new());
        let handler = CycleHandler {
            store: Arc::new(DiscardStore),
            metrics: Arc::clone(&metrics),
            stats: Arc::clone(&stats),
        };
        metrics.begin_cycle(STATS_REPORT_INTERVAL + 1);
        let position = Point::at_ground(48.0, 11.0);

        for step in 1..=STATS_REPORT_INTERVAL {
            stats.record(100, 200, Duration::from_millis(50));
            handler
                .on_complete(position, StepOutcome::Success(empty_envelope()))
                .await;
            if step < STATS_REPORT_INTERVAL {
                assert_eq!(stats.requests(), u64::try_from(step).expect("step"));
            }
        }
        assert_eq!(stats.requests(), 0);

        stats.record(100, 200, Duration::from_millis(50));
        handler
            .on_complete(position, StepOutcome::Success(empty_envelope()))
            .await;
        assert_eq!(stats.requests(), 1);
        assert_eq!(metrics.steps_completed(), STATS_REPORT_INTERVAL + 1);
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(0, 23, 3), 3);
        assert_eq!(worker_count(10, 23, 3), 3);
        assert_eq!(worker_count(69, 23, 3), 3);
        assert_eq!(worker_count(70, 23, 3), 4);
        assert_eq!(worker_count(100, 23, 3), 5);
        assert_eq!(worker_count(5, 0, 1), 5);
    }
}
