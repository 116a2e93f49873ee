//! FIFO of pending scan steps.

use async_trait::async_trait;
use scout_core::Point;
use scout_rpc::{ParsedEnvelope, SubRequest};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Final result of one work item.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The call succeeded
    Success(ParsedEnvelope),
    /// The item was given up on
    Failed {
        /// Calls made for this item
        attempts: u32,
        /// Error of the last call
        reason: String,
    },
}

/// Receives the outcome of every finished work item.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    /// Handle the outcome of the item scanned at `position`.
    async fn on_complete(&self, position: Point, outcome: StepOutcome);
}

/// A subrequest chain to execute at one position.
#[derive(Clone)]
pub struct WorkItem {
    /// Requests sent in one envelope
    pub subrequests: Vec<SubRequest>,
    /// Where the requests are made from
    pub position: Point,
    /// Calls already spent on this item
    pub attempts: u32,
    /// Receives the outcome
    pub handler: Arc<dyn CompletionHandler>,
    cycle: u64,
}

impl WorkItem {
    /// Create an item with no attempts spent.
    #[must_use]
    pub fn new(
        subrequests: Vec<SubRequest>,
        position: Point,
        handler: Arc<dyn CompletionHandler>,
    ) -> Self {
        Self {
            subrequests,
            position,
            attempts: 0,
            handler,
            cycle: 0,
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("position", &self.position)
            .field("subrequests", &self.subrequests.len())
            .field("attempts", &self.attempts)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

/// Shared queue with outstanding-work tracking.
///
/// An item counts as outstanding from [`push`](Self::push) until a worker
/// calls [`task_done`](Self::task_done) for it or it is dropped by
/// [`clear`](Self::clear). [`requeue`](Self::requeue) keeps it outstanding.
///
/// Items are stamped with the queue cycle they were pushed in. Every
/// [`clear`](Self::clear) starts a new cycle; items from an earlier cycle that
/// are still held by a worker are stale and only count down on completion.
#[derive(Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    available: Notify,
    outstanding: AtomicUsize,
    done: Notify,
    cycle: AtomicU64,
}

impl WorkQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a new item.
    pub async fn push(&self, mut item: WorkItem) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let mut items = self.items.lock().await;
        item.cycle = self.cycle.load(Ordering::SeqCst);
        items.push_back(item);
        drop(items);
        self.available.notify_one();
    }

    /// Put an item taken by [`pop`](Self::pop) back at the end.
    ///
    /// A stale item is finished instead.
    pub async fn requeue(&self, item: WorkItem) {
        let mut items = self.items.lock().await;
        if !self.is_current(&item) {
            drop(items);
            debug!("Discarding {} from an abandoned cycle", item.position);
            self.task_done();
            return;
        }
        items.push_back(item);
        drop(items);
        self.available.notify_one();
    }

    /// Whether `item` was pushed after the last [`clear`](Self::clear).
    #[must_use]
    pub fn is_current(&self, item: &WorkItem) -> bool {
        item.cycle == self.cycle.load(Ordering::SeqCst)
    }

    /// Wait for the next item.
    pub async fn pop(&self) -> WorkItem {
        loop {
            if let Some(item) = self.items.lock().await.pop_front() {
                return item;
            }
            self.available.notified().await;
        }
    }

    /// Pass a wakeup on to another waiting consumer.
    ///
    /// Called by consumers that abandon [`pop`](Self::pop) so that a wakeup
    /// they may have consumed is not lost.
    pub fn wake_one(&self) {
        self.available.notify_one();
    }

    /// Mark one popped item as finished.
    pub fn task_done(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous <= 1 {
            self.done.notify_waiters();
        }
    }

    /// Drop all queued items and start a new cycle. Returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let dropped = {
            let mut items = self.items.lock().await;
            let dropped = items.len();
            items.clear();
            self.cycle.fetch_add(1, Ordering::SeqCst);
            dropped
        };
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(dropped))
            })
            .unwrap_or(0);
        if previous.saturating_sub(dropped) == 0 {
            self.done.notify_waiters();
        }
        dropped
    }

    /// Wait until no item is outstanding.
    pub async fn wait_until_done(&self) {
        loop {
            let notified = self.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items waiting in the queue.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether no item is waiting in the queue.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Items pushed and not yet finished.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}
