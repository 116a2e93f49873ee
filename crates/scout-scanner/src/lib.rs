//! Scout Scanner - Multi-account scan loop.
//!
//! Spreads the coverage of the configured scan locations over a pool of
//! workers, each call made with an account leased from a throttling
//! scheduler. Parsed world state is handed to a [`scout_core::WorldStore`].
//!
//! # Components
//!
//! - [`AuthScheduler`]: time-ordered account pool with exclusive leases
//! - [`WorkQueue`]: FIFO of pending steps with outstanding-work tracking
//! - [`WorkerPool`]: resizable workers with an error throttle
//! - [`ScanControl`]: runtime location and account changes
//! - [`ScanOrchestrator`]: the idle / scanning / draining cycle loop
//!
//! # Example
//!
//! ```rust,ignore
//! use scout_scanner::ScanOrchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = ScanOrchestrator::new(&config, channel, store)?;
//! let shutdown = CancellationToken::new();
//! orchestrator.run(shutdown.clone()).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod control;
#[allow(missing_docs)]
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pool;
pub mod queue;
pub mod scheduler;

pub use control::ScanControl;
pub use error::{Result, ScanError};
pub use metrics::{MetricsSnapshot, ScanMetrics, ScanState};
pub use orchestrator::{worker_count, ScanOrchestrator, STATS_REPORT_INTERVAL};
pub use pool::{error_throttle, PoolSettings, WorkerPool};
pub use queue::{CompletionHandler, StepOutcome, WorkItem, WorkQueue};
pub use scheduler::{AccountLease, AuthScheduler};
