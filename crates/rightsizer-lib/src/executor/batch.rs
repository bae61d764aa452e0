//! Batch partitioning and per-pod serialization

use crate::models::{PodRef, ResizePlan};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Contiguous, ordered group of plans executed under one worker pool.
///
/// Each plan carries its position in the cycle's plan list so outcomes can be
/// put back in plan order after the batch joins.
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: usize,
    pub plans: Vec<(usize, ResizePlan)>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Split plans into contiguous batches of at most `batch_size`.
///
/// A `batch_size` of zero is treated as one.
pub fn partition(plans: Vec<ResizePlan>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches: Vec<Batch> = Vec::with_capacity(plans.len().div_ceil(batch_size));

    for (position, plan) in plans.into_iter().enumerate() {
        match batches.last_mut() {
            Some(batch) if batch.len() < batch_size => batch.plans.push((position, plan)),
            _ => batches.push(Batch {
                index: batches.len(),
                plans: vec![(position, plan)],
            }),
        }
    }

    batches
}

/// Async lock per pod. Holding the guard means no other apply for that pod
/// is in flight.
#[derive(Debug, Default)]
pub struct PodLocks {
    locks: DashMap<PodRef, Arc<Mutex<()>>>,
}

impl PodLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, pod: &PodRef) -> OwnedMutexGuard<()> {
        // Clone the Arc out so no map shard stays locked across the await
        let lock = self.locks.entry(pod.clone()).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
