//! Bounded fan-out of one stage's work items.
//!
//! The executor distributes an ordered item list across a pool of
//! `concurrency` workers and reduces the per-item outcomes into a
//! [`StageReport`]. Completion order is unconstrained, but the returned
//! outcome sequence always matches the input order — downstream file
//! numbering depends on positional identity, not on which worker finished
//! first.

use crate::outcome::{Outcome, StageReport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// One stage's per-item processing function.
///
/// Implementations must be infallible at the call boundary: errors are
/// reported as [`Outcome::Failure`], never raised, so one item's trouble
/// cannot touch its siblings.
#[async_trait]
pub trait ItemWorker<I, O>: Send + Sync {
    /// Processes a single work item.
    async fn process(&self, item: I) -> Outcome<O>;
}

/// Fans an item list out across a bounded worker pool.
#[derive(Debug, Clone, Copy)]
pub struct StageExecutor {
    concurrency: usize,
}

impl Default for StageExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}

impl StageExecutor {
    /// Creates an executor with the given pool bound (minimum 1).
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// The worker-pool bound.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `worker` over every item and returns the outcomes in input
    /// order, plus the aggregate report.
    ///
    /// Each item runs in its own task; a panicking worker is confined to its
    /// item and recorded as a failure. The call returns only after every
    /// worker has finished — there is no mid-stage preemption.
    pub async fn run<I, O, W>(
        &self,
        items: Vec<I>,
        worker: Arc<W>,
    ) -> (Vec<Outcome<O>>, StageReport)
    where
        I: Send + 'static,
        O: Send + 'static,
        W: ItemWorker<I, O> + ?Sized + 'static,
    {
        let total = items.len();
        debug!(total, concurrency = self.concurrency, "dispatching stage items");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(&worker);
            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                worker.process(item).await
            }));
        }

        // Joined in spawn order, which pins the output order to the input
        // order regardless of completion order.
        let mut outcomes = Vec::with_capacity(total);
        let mut report = StageReport::default();
        for (index, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(index, %err, "worker task did not run to completion");
                    Outcome::Failure(format!("worker crashed: {err}"))
                }
            };
            report.record(&outcome);
            outcomes.push(outcome);
        }

        (outcomes, report)
    }
}
