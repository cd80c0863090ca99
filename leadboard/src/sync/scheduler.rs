//! Periodic and manual flushing of the mutation queue.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{batch_digest, PlacementTransport};
use crate::cancellation::CancellationToken;
use crate::contracts::FlushRequest;
use crate::errors::{LeadboardError, NetworkError, PartialApplicationError, Result};
use crate::events::{BoardEvent, EventSink};
use crate::model::PlacementUpdate;
use crate::observability::SpanTimer;
use crate::queue::MutationQueue;

/// Reloads authoritative server state after a successful flush.
#[async_trait]
pub trait RefetchHook: Send + Sync {
    /// Reloads the board.
    async fn refetch(&self) -> Result<()>;
}

/// What started a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The periodic timer.
    Timer,
    /// The user pressed Save.
    Manual,
    /// The navigation guard's Save choice.
    Guard,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => write!(f, "timer"),
            Self::Manual => write!(f, "manual"),
            Self::Guard => write!(f, "guard"),
        }
    }
}

/// The result of a flush attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending. No call was made.
    Empty,
    /// Another flush was already in flight.
    Skipped,
    /// The batch was sent and fully applied.
    Flushed {
        /// Updates sent.
        count: usize,
        /// Batch digest.
        digest: String,
    },
}

struct SchedulerInner {
    queue: MutationQueue,
    transport: Arc<dyn PlacementTransport>,
    sink: Arc<dyn EventSink>,
    refetch: Option<Arc<dyn RefetchHook>>,
    interval: Duration,
    in_flight: AtomicBool,
    idle: watch::Sender<bool>,
}

/// Releases the in-flight flag on every exit path.
struct InFlight<'a> {
    inner: &'a SchedulerInner,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// Keeps every flush from starting until dropped.
///
/// Obtained from [`SyncScheduler::hold`]. Triggers that fire while a hold is
/// active return [`FlushOutcome::Skipped`].
pub struct FlushHold {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for FlushHold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushHold").finish_non_exhaustive()
    }
}

impl Drop for FlushHold {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl SchedulerInner {
    fn acquire(&self) -> bool {
        let acquired = self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if acquired {
            self.idle.send_replace(false);
        }
        acquired
    }

    fn release(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
        self.idle.send_replace(true);
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.acquire().then(|| InFlight { inner: self })
    }

    async fn flush(&self, trigger: FlushTrigger) -> Result<FlushOutcome> {
        let Some(_in_flight) = self.try_begin() else {
            debug!(%trigger, "Flush already in flight, skipping");
            return Ok(FlushOutcome::Skipped);
        };

        let snapshot = self.queue.flush_all();
        if snapshot.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        let count = snapshot.len();
        let digest = batch_digest(&snapshot);
        let timer = SpanTimer::start("sync.flush");
        info!(%trigger, count, %digest, "Flushing placement updates");

        let sent = self.transport.send_batch(FlushRequest::new(snapshot.clone())).await;
        let duration_ms = timer.finish();

        let response = match sent {
            Ok(response) if response.success => response,
            Ok(_) => return Err(self.fail(count, digest, NetworkError::rejected()).await),
            Err(e) => return Err(self.fail(count, digest, e).await),
        };

        if !response.failures.is_empty() {
            let applied: Vec<PlacementUpdate> =
                response.applied(&snapshot).into_iter().cloned().collect();
            self.queue.acknowledge(&applied);
            warn!(
                %digest,
                applied = applied.len(),
                failed = response.failures.len(),
                "Flush partially applied"
            );
            self.sink
                .emit(BoardEvent::SyncPartial {
                    applied: applied.len(),
                    failures: response.failures.clone(),
                })
                .await;
            return Err(PartialApplicationError::new(applied.len(), response.failures).into());
        }

        let removed = self.queue.acknowledge(&snapshot);
        info!(%digest, count, removed, duration_ms, "Flush succeeded");
        self.sink
            .emit(BoardEvent::SyncSucceeded {
                count,
                digest: digest.clone(),
            })
            .await;

        if let Some(ref hook) = self.refetch {
            if let Err(e) = hook.refetch().await {
                warn!(%digest, error = %e, "Refetch after flush failed");
            }
        }

        Ok(FlushOutcome::Flushed { count, digest })
    }

    async fn fail(&self, count: usize, digest: String, error: NetworkError) -> LeadboardError {
        warn!(%digest, count, error = %error, "Flush failed, updates stay queued");
        self.sink
            .emit(BoardEvent::SyncFailed {
                count,
                digest,
                message: error.to_string(),
            })
            .await;
        error.into()
    }
}

/// Drains a [`MutationQueue`] through a [`PlacementTransport`].
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
    task: Mutex<Option<(Arc<CancellationToken>, JoinHandle<()>)>>,
}

impl fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("interval", &self.inner.interval)
            .field("running", &self.is_running())
            .field("in_flight", &self.is_in_flight())
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(
        queue: MutationQueue,
        transport: Arc<dyn PlacementTransport>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(SchedulerInner {
                queue,
                transport,
                sink,
                refetch: None,
                interval,
                in_flight: AtomicBool::new(false),
                idle,
            }),
            task: Mutex::new(None),
        }
    }

    /// Reloads server state through `hook` after each successful flush.
    ///
    /// Must be called before [`SyncScheduler::start`].
    #[must_use]
    pub fn with_refetch(mut self, hook: Arc<dyn RefetchHook>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.refetch = Some(hook);
        } else {
            warn!("Scheduler already started, refetch hook ignored");
        }
        self
    }

    /// Returns the periodic interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Returns true while a flush is outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Returns true while the periodic task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Flushes the queue now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::LeadboardError::Network`] when the call fails
    /// and [`crate::errors::LeadboardError::PartialApplication`] when some items
    /// did not apply. The unapplied updates stay queued either way.
    pub async fn flush_now(&self, trigger: FlushTrigger) -> Result<FlushOutcome> {
        self.inner.flush(trigger).await
    }

    /// Resolves once no flush is in flight.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // The sender lives as long as `self`.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Waits for any in-flight flush to finish, then blocks new flushes
    /// until the returned hold is dropped.
    pub async fn hold(&self) -> FlushHold {
        loop {
            if self.inner.acquire() {
                return FlushHold {
                    inner: Arc::clone(&self.inner),
                };
            }
            self.wait_idle().await;
        }
    }

    /// Starts the periodic flush task. Starting twice is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let token = Arc::new(CancellationToken::new());
        let inner = Arc::clone(&self.inner);
        let cancel = Arc::clone(&token);
        let period = inner.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                // Outside the select so a running flush is never cancelled.
                if let Err(e) = inner.flush(FlushTrigger::Timer).await {
                    debug!(error = %e, "Periodic flush did not complete");
                }
            }
            debug!(reason = ?cancel.reason(), "Sync task stopped");
        });

        info!(
            interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Sync scheduler started"
        );
        *task = Some((token, handle));
    }

    /// Stops the periodic task and waits for it to exit.
    ///
    /// An in-flight flush is allowed to finish.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some((token, handle)) = task {
            token.cancel("scheduler stopped");
            if let Err(e) = handle.await {
                warn!(error = %e, "Sync task ended abnormally");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some((token, _)) = self.task.get_mut().take() {
            token.cancel("scheduler dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::FlushResponse;
    use crate::errors::ItemFailure;
    use crate::events::CollectingEventSink;
    use crate::queue::InMemoryBackend;
    use crate::sync::MockPlacementTransport;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn queue() -> MutationQueue {
        MutationQueue::new("test", Arc::new(InMemoryBackend::new()))
    }

    fn scheduler(
        queue: &MutationQueue,
        transport: impl PlacementTransport + 'static,
    ) -> (SyncScheduler, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let scheduler = SyncScheduler::new(
            queue.clone(),
            Arc::new(transport),
            sink.clone(),
            Duration::from_secs(5),
        );
        (scheduler, sink)
    }

    /// Holds every call until released.
    #[derive(Default)]
    struct GatedTransport {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PlacementTransport for Arc<GatedTransport> {
        async fn send_batch(&self, request: FlushRequest) -> std::result::Result<FlushResponse, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            let _ = request;
            Ok(FlushResponse::ok(Vec::new()))
        }
    }

    struct CountingRefetch(AtomicUsize);

    #[async_trait]
    impl RefetchHook for CountingRefetch {
        async fn refetch(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_call() {
        let queue = queue();
        let mut transport = MockPlacementTransport::new();
        transport.expect_send_batch().times(0);
        let (scheduler, sink) = scheduler(&queue, transport);

        assert_eq!(scheduler.flush_now(FlushTrigger::Manual).await.unwrap(), FlushOutcome::Empty);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_success_acknowledges_and_notifies() {
        let queue = queue();
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);

        let mut transport = MockPlacementTransport::new();
        transport
            .expect_send_batch()
            .withf(|request| request.len() == 1 && request.updates[0].stage_id == "won")
            .times(1)
            .returning(|_| Ok(FlushResponse::ok(Vec::new())));
        let (scheduler, sink) = scheduler(&queue, transport);

        let outcome = scheduler.flush_now(FlushTrigger::Manual).await.unwrap();
        assert!(matches!(outcome, FlushOutcome::Flushed { count: 1, .. }));
        assert!(queue.is_empty());
        assert_eq!(sink.event_types(), vec!["sync.succeeded"]);
    }

    #[tokio::test]
    async fn test_failure_keeps_queue_and_retries_same_batch() {
        let queue = queue();
        queue.enqueue([
            PlacementUpdate::new("c1", "p1", "won", 1),
            PlacementUpdate::new("c2", "p1", "lost", 1),
        ]);
        let before = queue.flush_all();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = AtomicUsize::new(0);
        let mut transport = MockPlacementTransport::new();
        let recorded = seen.clone();
        transport.expect_send_batch().times(2).returning(move |request| {
            recorded.lock().push(request.updates);
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(NetworkError::new("connection reset"))
            } else {
                Ok(FlushResponse::ok(Vec::new()))
            }
        });
        let (scheduler, sink) = scheduler(&queue, transport);

        let err = scheduler.flush_now(FlushTrigger::Timer).await.unwrap_err();
        assert!(matches!(err, LeadboardError::Network(_)));
        assert_eq!(queue.flush_all(), before);
        assert_eq!(sink.event_types(), vec!["sync.failed"]);

        scheduler.flush_now(FlushTrigger::Timer).await.unwrap();
        let seen = seen.lock();
        assert_eq!(seen[0], seen[1]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_unsuccessful_response_is_network_error() {
        let queue = queue();
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);

        let mut transport = MockPlacementTransport::new();
        transport.expect_send_batch().returning(|_| {
            Ok(FlushResponse {
                success: false,
                ..FlushResponse::default()
            })
        });
        let (scheduler, _) = scheduler(&queue, transport);

        let err = scheduler.flush_now(FlushTrigger::Manual).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_application_keeps_failed_items() {
        let queue = queue();
        queue.enqueue([
            PlacementUpdate::new("c1", "p1", "won", 1),
            PlacementUpdate::new("c2", "p1", "won", 2),
        ]);

        let mut transport = MockPlacementTransport::new();
        transport.expect_send_batch().returning(|_| {
            Ok(FlushResponse::ok(Vec::new())
                .with_failures(vec![ItemFailure::new("c2", "contact not found").with_pipeline("p1")]))
        });
        let (scheduler, sink) = scheduler(&queue, transport);

        let err = scheduler.flush_now(FlushTrigger::Manual).await.unwrap_err();
        match err {
            LeadboardError::PartialApplication(partial) => {
                assert_eq!(partial.applied, 1);
                assert_eq!(partial.failures[0].contact_id, "c2");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(queue.flush_all(), vec![PlacementUpdate::new("c2", "p1", "won", 2)]);
        assert_eq!(sink.event_types(), vec!["sync.partial"]);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_skipped() {
        let queue = queue();
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);
        let transport = Arc::new(GatedTransport::default());
        let (scheduler, _) = scheduler(&queue, transport.clone());
        let scheduler = Arc::new(scheduler);

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.flush_now(FlushTrigger::Timer).await })
        };
        transport.entered.notified().await;
        assert!(scheduler.is_in_flight());

        assert_eq!(scheduler.flush_now(FlushTrigger::Manual).await.unwrap(), FlushOutcome::Skipped);

        transport.release.notify_one();
        assert!(matches!(first.await.unwrap().unwrap(), FlushOutcome::Flushed { .. }));
        scheduler.wait_idle().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hold_waits_for_flush_and_blocks_new_ones() {
        let queue = queue();
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);
        let transport = Arc::new(GatedTransport::default());
        let (scheduler, _) = scheduler(&queue, transport.clone());
        let scheduler = Arc::new(scheduler);

        let flush = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.flush_now(FlushTrigger::Timer).await })
        };
        transport.entered.notified().await;

        let hold = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.hold().await })
        };
        tokio::task::yield_now().await;
        assert!(!hold.is_finished());

        transport.release.notify_one();
        flush.await.unwrap().unwrap();
        let hold = hold.await.unwrap();
        assert!(queue.is_empty());

        queue.enqueue([PlacementUpdate::new("c2", "p1", "won", 1)]);
        assert_eq!(scheduler.flush_now(FlushTrigger::Timer).await.unwrap(), FlushOutcome::Skipped);
        assert!(scheduler.is_in_flight());

        drop(hold);
        assert!(!scheduler.is_in_flight());
        transport.release.notify_one();
        assert!(matches!(
            scheduler.flush_now(FlushTrigger::Manual).await.unwrap(),
            FlushOutcome::Flushed { count: 1, .. }
        ));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_move_during_flush_survives_success() {
        let queue = queue();
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);
        let transport = Arc::new(GatedTransport::default());
        let (scheduler, _) = scheduler(&queue, transport.clone());
        let scheduler = Arc::new(scheduler);

        let flush = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.flush_now(FlushTrigger::Manual).await })
        };
        transport.entered.notified().await;
        queue.enqueue([PlacementUpdate::new("c1", "p1", "lost", 1)]);
        transport.release.notify_one();
        flush.await.unwrap().unwrap();

        assert_eq!(queue.flush_all(), vec![PlacementUpdate::new("c1", "p1", "lost", 1)]);
    }

    #[tokio::test]
    async fn test_refetch_after_success() {
        let queue = queue();
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);
        let mut transport = MockPlacementTransport::new();
        transport
            .expect_send_batch()
            .returning(|_| Ok(FlushResponse::ok(Vec::new())));

        let hook = Arc::new(CountingRefetch(AtomicUsize::new(0)));
        let (scheduler, _) = scheduler(&queue, transport);
        let scheduler = scheduler.with_refetch(hook.clone());

        scheduler.flush_now(FlushTrigger::Manual).await.unwrap();
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);

        // Nothing pending, nothing to refetch.
        scheduler.flush_now(FlushTrigger::Manual).await.unwrap();
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_until_stopped() {
        let queue = queue();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let mut transport = MockPlacementTransport::new();
        transport.expect_send_batch().returning(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Err(NetworkError::new("offline"))
        });
        let (scheduler, _) = scheduler(&queue, transport);
        queue.enqueue([PlacementUpdate::new("c1", "p1", "won", 1)]);

        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.len(), 1);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
