//! Batch resize executor
//!
//! Applies resize plans batch by batch. Within a batch a pool of at most
//! `concurrency` workers drains a shared queue; the pool is joined before the
//! next batch starts. Applies to the same pod are serialized by a per-pod lock.

mod apply;
mod batch;

#[cfg(test)]
mod tests;

pub use batch::{partition, Batch, PodLocks};

use crate::models::{ResizeOutcome, ResizePlan};
use crate::observability::RightsizerMetrics;
use crate::policy::ExecutorConfig;
use crate::runtime::ResizeRuntime;
use apply::Applier;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Result of executing one cycle's plans
#[derive(Debug, Default)]
pub struct ExecutionSummary {
    /// Outcomes in plan order
    pub outcomes: Vec<ResizeOutcome>,
    /// Plans not attempted because the cycle deadline passed
    pub deferred: Vec<ResizePlan>,
}

/// Batch resize executor
pub struct BatchExecutor {
    applier: Arc<Applier>,
    config: ExecutorConfig,
}

impl BatchExecutor {
    pub fn new(runtime: Arc<dyn ResizeRuntime>, config: ExecutorConfig) -> Self {
        let applier = Applier {
            runtime,
            locks: PodLocks::new(),
            timeout: config.apply_timeout(),
            dry_run: config.dry_run,
            metrics: RightsizerMetrics::new(),
        };

        Self {
            applier: Arc::new(applier),
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute plans with the configured batch size and concurrency
    pub async fn execute(&self, plans: Vec<ResizePlan>) -> ExecutionSummary {
        self.execute_with(plans, self.config.batch_size, self.config.concurrency)
            .await
    }

    /// Execute plans batch by batch.
    ///
    /// Batch N+1 starts only after every operation of batch N has a terminal
    /// outcome. Batches not started before the cycle deadline are deferred.
    pub async fn execute_with(
        &self,
        plans: Vec<ResizePlan>,
        batch_size: usize,
        concurrency: usize,
    ) -> ExecutionSummary {
        let started = Instant::now();
        let deadline = self.config.cycle_deadline();
        let pause = self.config.delay_between_batches();

        let batches = partition(plans, batch_size);
        let batch_count = batches.len();
        let mut summary = ExecutionSummary::default();
        let mut remaining = batches.into_iter();

        while let Some(batch) = remaining.next() {
            if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                summary.deferred = std::iter::once(batch)
                    .chain(remaining.by_ref())
                    .flat_map(|b| b.plans.into_iter().map(|(_, plan)| plan))
                    .collect();
                info!(
                    deferred = summary.deferred.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cycle deadline reached, deferring remaining plans"
                );
                break;
            }

            let index = batch.index;
            debug!(batch = index, size = batch.len(), "Starting batch");
            let outcomes = self.run_batch(batch, concurrency).await;
            debug!(batch = index, outcomes = outcomes.len(), "Batch complete");
            summary.outcomes.extend(outcomes);

            if !pause.is_zero() && index + 1 < batch_count {
                tokio::time::sleep(pause).await;
            }
        }

        self.applier.locks.prune();
        summary
    }

    /// Drain one batch with a fresh worker pool and wait for all of it
    async fn run_batch(&self, batch: Batch, concurrency: usize) -> Vec<ResizeOutcome> {
        let workers = concurrency.max(1).min(batch.len());
        let pending: BTreeMap<usize, ResizePlan> = batch.plans.iter().cloned().collect();
        let queue = Arc::new(Mutex::new(VecDeque::from(batch.plans)));

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let applier = Arc::clone(&self.applier);
            pool.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((position, plan)) = next else {
                        break;
                    };
                    done.push((position, applier.apply(plan).await));
                }
                done
            });
        }

        let mut outcomes: BTreeMap<usize, ResizeOutcome> = BTreeMap::new();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(done) => outcomes.extend(done),
                Err(e) => error!(error = %e, batch = batch.index, "Resize worker aborted"),
            }
        }

        // A plan lost with an aborted worker still gets a terminal outcome
        for (position, plan) in pending {
            outcomes
                .entry(position)
                .or_insert_with(|| apply::aborted_outcome(plan));
        }

        outcomes.into_values().collect()
    }
}
