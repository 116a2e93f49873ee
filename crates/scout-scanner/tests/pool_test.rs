//! Worker pool behavior against scripted transports.

mod common;

use async_trait::async_trait;
use common::{accounts, MapTransport, StaticIdentity};
use scout_core::Point;
use scout_rpc::{AccountSession, RpcChannel, SubRequest};
use scout_scanner::{
    AuthScheduler, CompletionHandler, PoolSettings, ScanMetrics, StepOutcome, WorkItem, WorkQueue,
    WorkerPool,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    outcomes: Mutex<Vec<(f64, StepOutcome)>>,
    panic_at: Option<f64>,
}

impl Recorder {
    fn successes(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Success(_)))
            .count()
    }

    fn failures(&self) -> Vec<(f64, u32)> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(lat, o)| match o {
                StepOutcome::Failed { attempts, .. } => Some((*lat, *attempts)),
                StepOutcome::Success(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl CompletionHandler for Recorder {
    async fn on_complete(&self, position: Point, outcome: StepOutcome) {
        if self.panic_at == Some(position.latitude) {
            panic!("handler blew up");
        }
        self.outcomes
            .lock()
            .unwrap()
            .push((position.latitude, outcome));
    }
}

struct Harness {
    queue: Arc<WorkQueue>,
    metrics: Arc<ScanMetrics>,
    pool: WorkerPool,
}

async fn harness(transport: Arc<MapTransport>, identity: Arc<StaticIdentity>, names: &[&str]) -> Harness {
    let channel = Arc::new(RpcChannel::new(transport, identity).with_retry_budget(1));
    let scheduler = Arc::new(AuthScheduler::default());
    scheduler
        .add_accounts(
            accounts(names)
                .into_iter()
                .map(|a| AccountSession::new(a, "https://start.invalid/rpc")),
        )
        .await;
    let queue = Arc::new(WorkQueue::new());
    let metrics = Arc::new(ScanMetrics::new());
    let settings = PoolSettings {
        throttle: Duration::from_secs(1),
        failure_delay: Duration::from_secs(1),
        sideline: Duration::from_secs(300),
        max_item_attempts: 3,
    };
    let pool = WorkerPool::new(
        Arc::clone(&queue),
        scheduler,
        channel,
        Arc::clone(&metrics),
        settings,
    );
    Harness {
        queue,
        metrics,
        pool,
    }
}

async fn enqueue(queue: &WorkQueue, handler: &Arc<Recorder>, count: u32) {
    for n in 0..count {
        let point = Point::new(10.0 + f64::from(n), 11.0, 0.0);
        let handler: Arc<dyn CompletionHandler> = handler.clone();
        queue
            .push(WorkItem::new(SubRequest::scan_chain(point), point, handler))
            .await;
    }
}

async fn drain(queue: &WorkQueue) {
    tokio::time::timeout(Duration::from_secs(3600), queue.wait_until_done())
        .await
        .expect("queue drains");
}

#[tokio::test(start_paused = true)]
async fn test_failing_items_are_retried_then_reported() {
    let transport = MapTransport::failing_at(&[12.0, 15.0]);
    let h = harness(transport.clone(), StaticIdentity::ok(), &["a", "b", "c"]).await;
    let recorder = Arc::new(Recorder::default());

    enqueue(&h.queue, &recorder, 10).await;
    h.pool.start(3).await;
    drain(&h.queue).await;
    h.pool.stop().await;

    assert_eq!(recorder.successes(), 8);
    let mut failures = recorder.failures();
    failures.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(failures, vec![(12.0, 3), (15.0, 3)]);
    assert_eq!(transport.posts(), 8 + 2 * 3);
    assert_eq!(h.queue.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_handler_panic_does_not_stop_the_pool() {
    let h = harness(MapTransport::new(), StaticIdentity::ok(), &["a", "b"]).await;
    let recorder = Arc::new(Recorder {
        panic_at: Some(13.0),
        ..Recorder::default()
    });

    enqueue(&h.queue, &recorder, 6).await;
    h.pool.resize(3).await;
    drain(&h.queue).await;
    h.pool.stop().await;

    assert_eq!(recorder.successes(), 5);
    assert_eq!(h.metrics.failed_steps(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_accounts_that_cannot_log_in_are_sidelined() {
    let identity = StaticIdentity::rejecting(&["banned"]);
    let h = harness(MapTransport::new(), identity, &["banned", "good"]).await;
    let recorder = Arc::new(Recorder::default());

    enqueue(&h.queue, &recorder, 5).await;
    h.pool.resize(2).await;
    drain(&h.queue).await;
    h.pool.stop().await;

    assert_eq!(recorder.successes(), 5);
    assert!(recorder.failures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resize_and_stop() {
    let h = harness(MapTransport::new(), StaticIdentity::ok(), &["a"]).await;

    h.pool.resize(5).await;
    assert_eq!(h.pool.size().await, 5);
    h.pool.resize(2).await;
    assert_eq!(h.pool.size().await, 2);

    // Shrunk pools keep serving the queue.
    let recorder = Arc::new(Recorder::default());
    enqueue(&h.queue, &recorder, 3).await;
    drain(&h.queue).await;
    assert_eq!(recorder.successes(), 3);

    h.pool.stop().await;
    assert_eq!(h.pool.size().await, 0);
}
