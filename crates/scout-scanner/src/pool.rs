//! Resizable pool of scan workers.
//!
//! Each worker repeatedly waits out the error throttle, takes an item from the
//! [`WorkQueue`], leases an account from the [`AuthScheduler`], performs the
//! call and hands the account back with a delay that depends on the outcome.

use crate::metrics::ScanMetrics;
use crate::queue::{StepOutcome, WorkItem, WorkQueue};
use crate::scheduler::{AccountLease, AuthScheduler};
use futures::FutureExt;
use scout_core::ScanningConfig;
use scout_rpc::{RpcChannel, RpcError, RpcResponse};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound of the error throttle.
pub const MAX_ERROR_THROTTLE: Duration = Duration::from_secs(120);

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause applied before each step after `consecutive_failures` failed calls.
///
/// Grows as `e^(n/5) - 1` seconds, capped at two minutes.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn error_throttle(consecutive_failures: u64) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }
    let secs = (consecutive_failures as f64 / 5.0).exp() - 1.0;
    Duration::from_secs_f64(secs.min(MAX_ERROR_THROTTLE.as_secs_f64()))
}

/// Account delays and retry limits used by the workers.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    /// Rest after a successful call
    pub throttle: Duration,
    /// Rest after a call that ran out of retries
    pub failure_delay: Duration,
    /// Rest after the account failed to log in
    pub sideline: Duration,
    /// Calls per item before it is reported as failed
    pub max_item_attempts: u32,
}

impl PoolSettings {
    /// Take the worker settings from the scanning configuration.
    #[must_use]
    pub fn from_config(config: &ScanningConfig) -> Self {
        Self {
            throttle: config.throttle(),
            failure_delay: config.failure_delay(),
            sideline: config.sideline(),
            max_item_attempts: config.max_item_attempts.max(1),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from_config(&ScanningConfig::default())
    }
}

struct Shared {
    queue: Arc<WorkQueue>,
    scheduler: Arc<AuthScheduler>,
    channel: Arc<RpcChannel>,
    metrics: Arc<ScanMetrics>,
    settings: PoolSettings,
}

struct Worker {
    id: usize,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Workers {
    running: Vec<Worker>,
    retired: Vec<JoinHandle<()>>,
    next_id: usize,
}

/// Workers draining a shared [`WorkQueue`].
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
}

impl WorkerPool {
    /// Create a pool with no workers.
    #[must_use]
    pub fn new(
        queue: Arc<WorkQueue>,
        scheduler: Arc<AuthScheduler>,
        channel: Arc<RpcChannel>,
        metrics: Arc<ScanMetrics>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue,
                scheduler,
                channel,
                metrics,
                settings,
            }),
            workers: Mutex::new(Workers::default()),
        }
    }

    /// Start `workers` workers.
    pub async fn start(&self, workers: usize) {
        info!("Starting worker pool with {} workers", workers);
        self.resize(workers).await;
    }

    /// Grow or shrink to `target` workers.
    ///
    /// Removed workers finish the call they are making before they exit.
    pub async fn resize(&self, target: usize) {
        let mut workers = self.workers.lock().await;
        let current = workers.running.len();
        if current != target {
            info!("Resizing worker pool from {} to {} workers", current, target);
        }

        while workers.running.len() < target {
            let id = workers.next_id;
            workers.next_id += 1;
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(run_worker(
                id,
                Arc::clone(&self.shared),
                cancel.clone(),
            ));
            workers.running.push(Worker { id, cancel, handle });
        }

        while workers.running.len() > target {
            if let Some(worker) = workers.running.pop() {
                debug!(worker = worker.id, "Retiring worker");
                worker.cancel.cancel();
                workers.retired.push(worker.handle);
            }
        }
        workers.retired.retain(|handle| !handle.is_finished());
    }

    /// Number of running workers.
    pub async fn size(&self) -> usize {
        self.workers.lock().await.running.len()
    }

    /// Stop every worker and wait for them to exit.
    pub async fn stop(&self) {
        info!("Stopping worker pool");
        let handles = {
            let mut workers = self.workers.lock().await;
            let mut handles = std::mem::take(&mut workers.retired);
            for worker in workers.running.drain(..) {
                worker.cancel.cancel();
                handles.push(worker.handle);
            }
            handles
        };

        for handle in handles {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Worker task failed: {:?}", e),
                Err(_) => warn!("Worker task timed out during shutdown"),
            }
        }
        info!("Worker pool stopped");
    }
}

async fn run_worker(id: usize, shared: Arc<Shared>, cancel: CancellationToken) {
    debug!(worker = id, "Worker started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let throttle = error_throttle(shared.metrics.consecutive_failures());
        if !throttle.is_zero() {
            debug!(worker = id, "Throttling for {:.1}s after errors", throttle.as_secs_f64());
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(throttle) => {}
            }
        }

        let item = tokio::select! {
            () = cancel.cancelled() => break,
            item = shared.queue.pop() => item,
        };

        let lease = tokio::select! {
            () = cancel.cancelled() => {
                shared.queue.requeue(item).await;
                break;
            }
            lease = shared.scheduler.acquire() => lease,
        };

        shared.process(id, item, lease).await;
    }

    shared.queue.wake_one();
    debug!(worker = id, "Worker stopped");
}

impl Shared {
    async fn process(&self, worker: usize, mut item: WorkItem, mut lease: AccountLease) {
        if !self.queue.is_current(&item) {
            self.scheduler.release(lease, Duration::ZERO).await;
            self.discard(&item);
            return;
        }

        debug!(
            worker,
            username = lease.username(),
            "Scanning {}",
            item.position
        );

        let result = self
            .channel
            .call(lease.session_mut(), item.subrequests.clone(), item.position)
            .await;

        match result {
            Ok(RpcResponse::Success(envelope)) => {
                self.scheduler.release(lease, self.settings.throttle).await;
                self.complete(&item, StepOutcome::Success(envelope)).await;
            }
            Ok(RpcResponse::Failed { last_error, .. }) => {
                self.scheduler
                    .release(lease, self.settings.failure_delay)
                    .await;
                self.metrics.record_call_failure();
                item.attempts += 1;
                if item.attempts >= self.settings.max_item_attempts {
                    warn!(
                        "Giving up on {} after {} attempts: {}",
                        item.position, item.attempts, last_error
                    );
                    let outcome = StepOutcome::Failed {
                        attempts: item.attempts,
                        reason: last_error,
                    };
                    self.complete(&item, outcome).await;
                } else {
                    debug!(
                        "Requeueing {} (attempt {}/{})",
                        item.position, item.attempts, self.settings.max_item_attempts
                    );
                    self.queue.requeue(item).await;
                }
            }
            Err(RpcError::Auth(e)) => {
                warn!(
                    username = lease.username(),
                    "Sidelining account for {}s: {}",
                    self.settings.sideline.as_secs(),
                    e
                );
                self.scheduler.release(lease, self.settings.sideline).await;
                self.queue.requeue(item).await;
            }
            Err(e) => {
                error!("Dropping {}: {}", item.position, e);
                self.scheduler.release(lease, self.settings.throttle).await;
                let outcome = StepOutcome::Failed {
                    attempts: item.attempts,
                    reason: e.to_string(),
                };
                self.complete(&item, outcome).await;
            }
        }
    }

    async fn complete(&self, item: &WorkItem, outcome: StepOutcome) {
        if !self.queue.is_current(item) {
            self.discard(item);
            return;
        }
        let handled = AssertUnwindSafe(item.handler.on_complete(item.position, outcome))
            .catch_unwind()
            .await;
        if handled.is_err() {
            error!("Completion handler panicked for {}", item.position);
            self.metrics.record_processing_failure();
        }
        self.queue.task_done();
    }

    fn discard(&self, item: &WorkItem) {
        debug!("Discarding {} from an abandoned cycle", item.position);
        self.queue.task_done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_throttle() {
        assert_eq!(error_throttle(0), Duration::ZERO);

        let one = error_throttle(1).as_secs_f64();
        assert!((one - (0.2f64.exp() - 1.0)).abs() < 1e-6);

        let ten = error_throttle(10).as_secs_f64();
        assert!((ten - (2.0f64.exp() - 1.0)).abs() < 1e-6);

        assert_eq!(error_throttle(100), MAX_ERROR_THROTTLE);
        assert_eq!(error_throttle(u64::MAX), MAX_ERROR_THROTTLE);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = ScanningConfig {
            throttle_secs: 4,
            max_item_attempts: 0,
            ..ScanningConfig::default()
        };
        let settings = PoolSettings::from_config(&config);
        assert_eq!(settings.throttle, Duration::from_secs(4));
        assert_eq!(settings.max_item_attempts, 1);

        config.sideline_secs = 60;
        assert_eq!(
            PoolSettings::from_config(&config).sideline,
            Duration::from_secs(60)
        );
    }
}
