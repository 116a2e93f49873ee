//! Request throughput statistics.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Window {
    started: Option<Instant>,
    requests: u64,
    bytes_up: u64,
    bytes_down: u64,
    total_latency: Duration,
}

/// Counts requests, bytes and latency since the last reset.
#[derive(Debug, Default)]
pub struct RequestStats {
    window: Mutex<Window>,
}

impl RequestStats {
    /// Create an empty statistics window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one finished request.
    pub fn record(&self, bytes_up: usize, bytes_down: usize, latency: Duration) {
        let mut window = self.lock();
        // The window opens when its first request was sent.
        window
            .started
            .get_or_insert_with(|| Instant::now().checked_sub(latency).unwrap_or_else(Instant::now));
        window.requests += 1;
        window.bytes_up += bytes_up as u64;
        window.bytes_down += bytes_down as u64;
        window.total_latency += latency;
    }

    /// Requests recorded since the last reset.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.lock().requests
    }

    /// Compact one-line report, or `None` if nothing was recorded.
    #[must_use]
    pub fn report(&self) -> Option<String> {
        let window = self.lock();
        let started = window.started?;
        if window.requests == 0 {
            return None;
        }
        Some(format_report(
            window.requests,
            started.elapsed(),
            window.bytes_up,
            window.bytes_down,
            window.total_latency,
        ))
    }

    /// Start a new window.
    pub fn reset(&self) {
        *self.lock() = Window::default();
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_report(
    requests: u64,
    elapsed: Duration,
    bytes_up: u64,
    bytes_down: u64,
    total_latency: Duration,
) -> String {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    let whole = elapsed.as_secs();
    format!(
        "{requests:>5} reqs in {:02}m{:02}s  [{:>5.1} reqs/s {}B/s (up) {}B/s (down)] {:.2}s av. per request",
        whole / 60,
        whole % 60,
        requests as f64 / secs,
        human_size(bytes_up as f64 / secs),
        human_size(bytes_down as f64 / secs),
        total_latency.as_secs_f64() / requests as f64,
    )
}

fn human_size(mut num: f64) -> String {
    for unit in [" ", "K", "M", "G", "T"] {
        if num.abs() < 1024.0 {
            return format!("{num:5.1}{unit}");
        }
        num /= 1024.0;
    }
    format!("{num:.1}P")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_has_no_report() {
        let stats = RequestStats::new();
        assert!(stats.report().is_none());
    }

    #[test]
    fn test_report_and_reset() {
        let stats = RequestStats::new();
        stats.record(100, 2048, Duration::from_millis(200));
        stats.record(100, 2048, Duration::from_millis(400));

        let report = stats.report().expect("report after records");
        assert!(report.contains("2 reqs in"), "{report}");
        assert!(report.contains("0.30s av. per request"), "{report}");
        assert_eq!(stats.requests(), 2);

        stats.reset();
        assert_eq!(stats.requests(), 0);
        assert!(stats.report().is_none());
    }

    #[test]
    fn test_format_report() {
        let report = format_report(
            120,
            Duration::from_secs(125),
            125 * 1024,
            0,
            Duration::from_secs(60),
        );
        assert!(report.starts_with("  120 reqs in 02m05s"), "{report}");
        assert!(report.contains("  1.0KB/s (up)"), "{report}");
        assert!(report.contains("0.50s av. per request"), "{report}");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512.0), "512.0 ");
        assert_eq!(human_size(2048.0), "  2.0K");
    }
}
