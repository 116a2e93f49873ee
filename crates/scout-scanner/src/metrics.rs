//! Live scan counters.

use scout_core::now_millis;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

/// Phase of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Waiting for locations, accounts or the next cycle
    Idle,
    /// Work for the current coverage is queued
    Scanning,
    /// A restart was requested and pending work is being dropped
    Draining,
}

impl ScanState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Scanning => 1,
            Self::Draining => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scanning,
            2 => Self::Draining,
            _ => Self::Idle,
        }
    }
}

/// Counters shared between the orchestrator, the workers and status readers.
#[derive(Debug, Default)]
pub struct ScanMetrics {
    state: AtomicU8,
    steps_completed: AtomicUsize,
    total_steps: AtomicUsize,
    failed_steps: AtomicUsize,
    consecutive_failures: AtomicU64,
    last_success_ms: AtomicI64,
    last_scan_duration_ms: AtomicU64,
    cycles_completed: AtomicU64,
    active_workers: AtomicUsize,
    active_accounts: AtomicUsize,
}

/// Point-in-time copy of [`ScanMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Phase of the scan loop
    pub state: ScanState,
    /// Steps of the current cycle that delivered a response
    pub steps_completed: usize,
    /// Steps in the current cycle
    pub total_steps: usize,
    /// Steps of the current cycle that were given up on
    pub failed_steps: usize,
    /// Failures since the last success
    pub consecutive_failures: u64,
    /// Epoch millis of the last success, 0 if none
    pub last_success_ms: i64,
    /// Duration of the last completed cycle
    pub last_scan_duration_ms: u64,
    /// Cycles run to completion
    pub cycles_completed: u64,
    /// Running workers
    pub active_workers: usize,
    /// Accounts in rotation
    pub active_accounts: usize,
    /// Completed share of the current cycle
    pub progress_percent: f64,
}

impl ScanMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-cycle counters for a cycle of `total` steps.
    pub fn begin_cycle(&self, total: usize) {
        self.steps_completed.store(0, Ordering::SeqCst);
        self.failed_steps.store(0, Ordering::SeqCst);
        self.total_steps.store(total, Ordering::SeqCst);
    }

    /// Record a cycle that ran to completion.
    pub fn finish_cycle(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.last_scan_duration_ms.store(millis, Ordering::SeqCst);
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
    }

    /// A step delivered its response. Returns the new completed count.
    pub fn record_step_completed(&self) -> usize {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.last_success_ms.store(now_millis(), Ordering::SeqCst);
        self.steps_completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A call exhausted its retry budget.
    pub fn record_call_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// A step was given up on.
    pub fn record_failed_step(&self) {
        self.failed_steps.fetch_add(1, Ordering::SeqCst);
    }

    /// A response arrived but could not be processed.
    pub fn record_processing_failure(&self) {
        self.record_call_failure();
        self.record_failed_step();
    }

    /// Publish the current phase.
    pub fn set_state(&self, state: ScanState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Publish pool sizes.
    pub fn set_active(&self, workers: usize, accounts: usize) {
        self.active_workers.store(workers, Ordering::SeqCst);
        self.active_accounts.store(accounts, Ordering::SeqCst);
    }

    /// Current phase.
    #[must_use]
    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Steps completed in the current cycle.
    #[must_use]
    pub fn steps_completed(&self) -> usize {
        self.steps_completed.load(Ordering::SeqCst)
    }

    /// Steps in the current cycle.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.total_steps.load(Ordering::SeqCst)
    }

    /// Steps given up on in the current cycle.
    #[must_use]
    pub fn failed_steps(&self) -> usize {
        self.failed_steps.load(Ordering::SeqCst)
    }

    /// Failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Cycles run to completion.
    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    /// Completed share of the current cycle, 0 to 100.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        let total = self.total_steps();
        if total == 0 {
            return 0.0;
        }
        self.steps_completed() as f64 * 100.0 / total as f64
    }

    /// Copy all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            state: self.state(),
            steps_completed: self.steps_completed(),
            total_steps: self.total_steps(),
            failed_steps: self.failed_steps(),
            consecutive_failures: self.consecutive_failures(),
            last_success_ms: self.last_success_ms.load(Ordering::SeqCst),
            last_scan_duration_ms: self.last_scan_duration_ms.load(Ordering::SeqCst),
            cycles_completed: self.cycles_completed(),
            active_workers: self.active_workers.load(Ordering::SeqCst),
            active_accounts: self.active_accounts.load(Ordering::SeqCst),
            progress_percent: self.progress_percent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let metrics = ScanMetrics::new();
        assert!(metrics.progress_percent().abs() < f64::EPSILON);

        metrics.begin_cycle(4);
        metrics.record_step_completed();
        assert!((metrics.progress_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let metrics = ScanMetrics::new();
        metrics.record_call_failure();
        metrics.record_processing_failure();
        assert_eq!(metrics.consecutive_failures(), 2);
        assert_eq!(metrics.failed_steps(), 1);

        assert_eq!(metrics.record_step_completed(), 1);
        assert_eq!(metrics.consecutive_failures(), 0);
        assert!(metrics.snapshot().last_success_ms > 0);
    }

    #[test]
    fn test_begin_cycle_resets_steps() {
        let metrics = ScanMetrics::new();
        metrics.begin_cycle(2);
        metrics.record_step_completed();
        metrics.record_failed_step();
        metrics.begin_cycle(10);
        assert_eq!(metrics.steps_completed(), 0);
        assert_eq!(metrics.failed_steps(), 0);
        assert_eq!(metrics.total_steps(), 10);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ScanMetrics::new();
        metrics.set_state(ScanState::Draining);
        metrics.set_active(3, 7);
        let json = serde_json::to_value(metrics.snapshot()).expect("serialize");
        assert_eq!(json["state"], "draining");
        assert_eq!(json["active_workers"], 3);
        assert_eq!(json["active_accounts"], 7);
    }
}
