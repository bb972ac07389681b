//! Per-key FIFO operation lanes.
//!
//! Each key (a chat) gets one worker task that owns the key's state and runs
//! submitted operations strictly one at a time, in submission order. Callers
//! hold a cheap mailbox and wait on a oneshot for the operation's return
//! value. Different keys never wait on each other.
//!
//! Operations are synchronous closures: they cannot await, so an operation
//! never yields the lane half-way through.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::EngineError;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("no lane for key {0}")]
    NotFound(String),
    #[error("lane is full")]
    Overloaded,
    #[error("lane worker stopped")]
    Closed,
}

impl From<QueueError> for EngineError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(chat_id) => EngineError::NotFound { chat_id },
            QueueError::Overloaded => EngineError::Overloaded,
            QueueError::Closed => EngineError::Unavailable,
        }
    }
}

/// Point-in-time view of one lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Operations accepted but not yet started.
    pub queue_length: usize,
    /// An operation is executing right now.
    pub queue_processing: bool,
}

#[derive(Debug, Default)]
struct LaneStats {
    pending: AtomicUsize,
    processing: AtomicBool,
}

impl LaneStats {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            queue_length: self.pending.load(Ordering::SeqCst),
            queue_processing: self.processing.load(Ordering::SeqCst),
        }
    }
}

struct Lane<S> {
    sender: mpsc::Sender<Job<S>>,
    stats: Arc<LaneStats>,
}

impl<S> Clone for Lane<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stats: self.stats.clone(),
        }
    }
}

pub struct OperationQueue<S> {
    max_pending: usize,
    lanes: Mutex<HashMap<String, Lane<S>>>,
}

impl<S: Send + 'static> OperationQueue<S> {
    /// `max_pending` bounds how many operations may wait in one lane.
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending: max_pending.max(1),
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Open the lane for `key`, building its state with `init` if it does
    /// not exist yet. Returns true when a new lane was created.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, key: &str, init: impl FnOnce() -> S) -> bool {
        let mut lanes = self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if lanes.contains_key(key) {
            return false;
        }
        let (sender, receiver) = mpsc::channel(self.max_pending);
        let stats = Arc::new(LaneStats::default());
        tokio::spawn(run_lane(key.to_string(), init(), receiver, stats.clone()));
        lanes.insert(key.to_string(), Lane { sender, stats });
        debug!(lane = key, "lane opened");
        true
    }

    /// Forget the lane for `key`. Operations already accepted still run; the
    /// worker stops and drops its state once the last in-flight sender is gone.
    pub fn close(&self, key: &str) -> bool {
        let mut lanes = self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let closed = lanes.remove(key).is_some();
        if closed {
            debug!(lane = key, "lane closing");
        }
        closed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lanes
            .lock()
            .map(|lanes| lanes.contains_key(key))
            .unwrap_or(false)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lanes
            .lock()
            .map(|lanes| lanes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self, key: &str) -> Option<QueueStats> {
        self.lane(key).map(|lane| lane.stats.snapshot())
    }

    fn lane(&self, key: &str) -> Option<Lane<S>> {
        self.lanes
            .lock()
            .ok()
            .and_then(|lanes| lanes.get(key).cloned())
    }

    /// Append `op` to the lane for `key` and wait for its result.
    ///
    /// Fails fast with [`QueueError::Overloaded`] when the lane already holds
    /// `max_pending` waiting operations. Once accepted, the operation runs
    /// even if the returned future is dropped.
    pub async fn submit<R, F>(&self, key: &str, op: F) -> Result<R, QueueError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let lane = self
            .lane(key)
            .ok_or_else(|| QueueError::NotFound(key.to_string()))?;
        let (response, receiver) = oneshot::channel();
        let job: Job<S> = Box::new(move |state: &mut S| {
            let _ = response.send(op(state));
        });

        lane.stats.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = lane.sender.try_send(job) {
            lane.stats.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(match err {
                mpsc::error::TrySendError::Full(_) => QueueError::Overloaded,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            });
        }
        receiver.await.map_err(|_| QueueError::Closed)
    }
}

async fn run_lane<S>(
    key: String,
    mut state: S,
    mut jobs: mpsc::Receiver<Job<S>>,
    stats: Arc<LaneStats>,
) {
    while let Some(job) = jobs.recv().await {
        stats.pending.fetch_sub(1, Ordering::SeqCst);
        stats.processing.store(true, Ordering::SeqCst);
        // A panicking operation drops its responder; the lane keeps going.
        if catch_unwind(AssertUnwindSafe(|| job(&mut state))).is_err() {
            error!(lane = %key, "operation panicked");
        }
        stats.processing.store(false, Ordering::SeqCst);
    }
    debug!(lane = %key, "lane closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::time::Duration;

    #[tokio::test]
    async fn test_operations_run_in_submission_order() {
        let queue = OperationQueue::<Vec<u32>>::new(64);
        queue.open("chat1", Vec::new);

        // join_all polls in order, and a submission is enqueued on first poll.
        let submissions = (0..20u32).map(|i| {
            queue.submit("chat1", move |log: &mut Vec<u32>| {
                log.push(i);
                log.len()
            })
        });
        let positions: Vec<usize> = join_all(submissions)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();
        assert_eq!(positions, (1..=20).collect::<Vec<_>>());

        let log = queue.submit("chat1", |log: &mut Vec<u32>| log.clone()).await.unwrap();
        assert_eq!(log, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sequential_submissions_see_prior_effects() {
        let queue = OperationQueue::<u64>::new(8);
        queue.open("a", || 0);
        for expected in 1..=5 {
            let value = queue
                .submit("a", |n: &mut u64| {
                    *n += 1;
                    *n
                })
                .await
                .unwrap();
            assert_eq!(value, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_lane() {
        let queue = OperationQueue::<u64>::new(8);
        assert_eq!(
            queue.submit("missing", |n: &mut u64| *n).await,
            Err(QueueError::NotFound("missing".to_string()))
        );
        assert!(!queue.contains("missing"));
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let queue = OperationQueue::<u64>::new(8);
        assert!(queue.open("a", || 7));
        assert!(!queue.open("a", || 99));
        assert_eq!(queue.submit("a", |n: &mut u64| *n).await, Ok(7));
        assert_eq!(queue.keys(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_close_stops_worker() {
        let queue = OperationQueue::<oneshot::Sender<()>>::new(8);
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        queue.open("a", move || alive_tx);
        assert!(queue.close("a"));
        assert!(!queue.close("a"));
        assert!(queue.stats("a").is_none());
        assert!(matches!(
            queue.submit("a", |_tx: &mut oneshot::Sender<()>| ()).await,
            Err(QueueError::NotFound(_))
        ));

        // The worker drops its state when it exits.
        let dropped = tokio::time::timeout(Duration::from_secs(5), alive_rx)
            .await
            .unwrap();
        assert!(dropped.is_err());

        // The key can be reopened with fresh state.
        let (fresh_tx, _fresh_rx) = oneshot::channel::<()>();
        assert!(queue.open("a", move || fresh_tx));
        assert_eq!(queue.keys(), vec!["a".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_lane_rejects_without_blocking() {
        let queue = Arc::new(OperationQueue::<u64>::new(2));
        queue.open("a", || 0);

        // Park the worker on a blocking operation.
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let blocker = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .submit("a", move |_n: &mut u64| {
                        let _ = started_tx.send(());
                        let _ = tokio::task::block_in_place(|| release_rx.recv());
                    })
                    .await
            })
        };
        started_rx.await.unwrap();
        assert!(queue.stats("a").unwrap().queue_processing);

        // One poll enqueues; the accepted operations run without a waiter.
        for _ in 0..2 {
            let submit = queue.submit("a", |n: &mut u64| *n += 1);
            let _ = tokio::time::timeout(Duration::ZERO, submit).await;
        }
        assert_eq!(queue.stats("a").unwrap().queue_length, 2);

        assert_eq!(
            queue.submit("a", |n: &mut u64| *n += 1).await,
            Err(QueueError::Overloaded)
        );
        assert_eq!(queue.stats("a").unwrap().queue_length, 2);

        release_tx.send(()).unwrap();
        blocker.await.unwrap().unwrap();
        assert_eq!(queue.submit("a", |n: &mut u64| *n).await, Ok(2));
        assert_eq!(queue.stats("a").unwrap().queue_length, 0);
    }

    #[tokio::test]
    async fn test_failed_operation_does_not_block_lane() {
        let queue = OperationQueue::<u64>::new(8);
        queue.open("a", || 1);
        let failed: Result<Result<u64, String>, _> = queue
            .submit("a", |_n: &mut u64| Err("nope".to_string()))
            .await;
        assert_eq!(failed, Ok(Err("nope".to_string())));
        assert_eq!(queue.submit("a", |n: &mut u64| *n).await, Ok(1));
    }

    #[tokio::test]
    async fn test_panicking_operation_does_not_kill_lane() {
        let queue = OperationQueue::<u64>::new(8);
        queue.open("a", || 3);
        let result = queue
            .submit("a", |_n: &mut u64| -> u64 { panic!("boom") })
            .await;
        assert_eq!(result, Err(QueueError::Closed));
        assert_eq!(queue.submit("a", |n: &mut u64| *n).await, Ok(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lanes_are_independent() {
        let queue = Arc::new(OperationQueue::<u64>::new(4));
        queue.open("slow", || 0);
        queue.open("fast", || 0);

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let slow = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .submit("slow", move |_n: &mut u64| {
                        let _ = started_tx.send(());
                        let _ = tokio::task::block_in_place(|| release_rx.recv());
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let value = tokio::time::timeout(
            Duration::from_secs(5),
            queue.submit("fast", |n: &mut u64| {
                *n += 1;
                *n
            }),
        )
        .await
        .unwrap();
        assert_eq!(value, Ok(1));

        release_tx.send(()).unwrap();
        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropped_caller_still_runs() {
        let queue = OperationQueue::<u64>::new(8);
        queue.open("a", || 0);
        {
            let fut = queue.submit("a", |n: &mut u64| *n += 10);
            // Poll once so the job is enqueued, then drop the future.
            let _ = tokio::time::timeout(Duration::from_millis(0), fut).await;
        }
        let value = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let n = queue.submit("a", |n: &mut u64| *n).await.unwrap();
                if n == 10 {
                    return n;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 10);
    }
}
