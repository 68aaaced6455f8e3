//! Bounded-concurrency execution of independent lookups.
//!
//! The harness keeps at most `workers` lookups in flight, reports one progress
//! event per finished task and hands results back in completion order, tagged
//! with the index they were submitted under. Cancellation stops dispatching;
//! lookups already running finish in the background and their results are dropped.

use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::models::{CanonicalQuery, FetchOutcome};
use crate::resolve::Resolve;

/// Default number of lookups run at once
pub const DEFAULT_WORKERS: usize = 4;

/// One lookup to run
pub struct FetchTask {
    /// Position of the query in the submitted batch
    pub index: usize,
    pub query: CanonicalQuery,
    pub max_count: usize,
    pub resolver: Arc<dyn Resolve>,
}

impl FetchTask {
    pub fn new(index: usize, query: CanonicalQuery, max_count: usize, resolver: Arc<dyn Resolve>) -> Self {
        Self {
            index,
            query,
            max_count,
            resolver,
        }
    }
}

impl fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchTask")
            .field("index", &self.index)
            .field("query", &self.query.raw)
            .field("max_count", &self.max_count)
            .field("resolver", &self.resolver.name())
            .finish()
    }
}

/// Outcome of one task
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub index: usize,
    pub outcome: FetchOutcome,
}

/// Emitted once per finished task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub index: usize,
    pub backend: String,
    pub success: bool,
    pub count: usize,
    /// Tasks finished so far, including this one
    pub completed: usize,
    pub total: usize,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "{} search found {} record(s).", self.backend, self.count)
        } else {
            write!(f, "{} search failed!", self.backend)
        }
    }
}

/// Runs fetch tasks on a fixed number of workers
#[derive(Debug, Clone)]
pub struct FetchHarness {
    workers: usize,
    cancel: CancellationToken,
}

impl FetchHarness {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Token that cancels this harness; clones may be handed to signal handlers
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run every task, returning results in completion order.
    ///
    /// After cancellation the results of tasks that finished before it are returned.
    pub async fn run(
        &self,
        tasks: Vec<FetchTask>,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> Vec<TaskResult> {
        let total = tasks.len();
        let mut queue = tasks.into_iter();
        let mut running: JoinSet<TaskResult> = JoinSet::new();
        let mut results = Vec::with_capacity(total);

        loop {
            while running.len() < self.workers && !self.cancel.is_cancelled() {
                let Some(task) = queue.next() else {
                    break;
                };
                running.spawn(run_task(task));
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!("Lookups cancelled with {} still running", running.len());
                    running.detach_all();
                    break;
                }

                joined = running.join_next() => match joined {
                    Some(Ok(result)) => {
                        if let Some(tx) = &progress {
                            let _ = tx.send(ProgressEvent {
                                index: result.index,
                                backend: result.outcome.backend.clone(),
                                success: !result.outcome.is_failure(),
                                count: result.outcome.count,
                                completed: results.len() + 1,
                                total,
                            });
                        }
                        results.push(result);
                    }
                    Some(Err(e)) => tracing::warn!("Lookup task did not finish: {}", e),
                    None => break,
                },
            }
        }

        results
    }
}

impl Default for FetchHarness {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

async fn run_task(task: FetchTask) -> TaskResult {
    let name = task.resolver.name().to_string();
    let outcome = AssertUnwindSafe(task.resolver.resolve(&task.query, task.max_count))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            tracing::error!("Lookup {} panicked", task.index);
            FetchOutcome::failed(name, "lookup panicked")
        });

    TaskResult {
        index: task.index,
        outcome,
    }
}

/// Put results back in submission order
pub fn into_submission_order(mut results: Vec<TaskResult>) -> Vec<TaskResult> {
    results.sort_by_key(|r| r.index);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sleeps longer for earlier queries and records how many run at once
    #[derive(Default)]
    struct SlowResolver {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
        cancel_on_call: Option<CancellationToken>,
        panic_on: Option<String>,
    }

    #[async_trait]
    impl Resolve for SlowResolver {
        fn name(&self) -> &str {
            "slow"
        }

        async fn resolve(&self, query: &CanonicalQuery, _max_count: usize) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on.as_deref() == Some(query.raw.as_str()) {
                panic!("resolver exploded");
            }
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay: u64 = query.raw.parse().unwrap_or(1);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            FetchOutcome::empty(query.raw.clone())
        }
    }

    fn tasks(resolver: &Arc<SlowResolver>, delays: &[u64]) -> Vec<FetchTask> {
        delays
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let resolver: Arc<dyn Resolve> = resolver.clone();
                FetchTask::new(i, CanonicalQuery::new(d.to_string()), 10, resolver)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_six_tasks_on_four_workers() {
        let resolver = Arc::new(SlowResolver::default());
        let harness = FetchHarness::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let results = harness
            .run(tasks(&resolver, &[60, 50, 40, 30, 20, 10]), Some(tx))
            .await;

        assert_eq!(results.len(), 6);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 6);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 4);

        let ordered = into_submission_order(results);
        let indices: Vec<usize> = ordered.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(ordered[0].outcome.backend, "60");

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 6);
        assert_eq!(events.last().map(|e| e.completed), Some(6));
        assert!(events.iter().all(|e| e.total == 6 && e.success));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let resolver = Arc::new(SlowResolver::default());
        let harness = FetchHarness::new(2);
        harness.cancel();

        let results = harness.run(tasks(&resolver, &[1, 1, 1]), None).await;
        assert!(results.is_empty());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatching() {
        let harness = FetchHarness::new(1);
        let resolver = Arc::new(SlowResolver {
            cancel_on_call: Some(harness.cancel_token()),
            ..SlowResolver::default()
        });

        let results = harness.run(tasks(&resolver, &[5, 5, 5]), None).await;
        assert!(results.len() <= 1);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_outcome() {
        let resolver = Arc::new(SlowResolver {
            panic_on: Some("7".to_string()),
            ..SlowResolver::default()
        });
        let harness = FetchHarness::new(2);

        let results = into_submission_order(harness.run(tasks(&resolver, &[1, 7]), None).await);
        assert_eq!(results.len(), 2);
        assert!(!results[0].outcome.is_failure());
        assert!(results[1].outcome.is_failure());
        assert_eq!(results[1].outcome.backend, "slow");
    }

    #[test]
    fn test_progress_event_display() {
        let mut event = ProgressEvent {
            index: 0,
            backend: "zbMATH".to_string(),
            success: true,
            count: 3,
            completed: 1,
            total: 2,
        };
        assert_eq!(event.to_string(), "zbMATH search found 3 record(s).");
        event.success = false;
        assert_eq!(event.to_string(), "zbMATH search failed!");
    }
}
