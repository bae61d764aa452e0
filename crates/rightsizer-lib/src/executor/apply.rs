//! Per-plan apply algorithm
//!
//! One combined patch per plan. A structural rejection of some dimensions is
//! followed by at most one retry carrying only the remaining dimensions;
//! failures and timeouts are never retried within the cycle.

use super::batch::PodLocks;
use crate::error::RuntimeError;
use crate::models::{DimensionStatus, ResizeOutcome, ResizePlan, ResourceDimension, SkipReason};
use crate::observability::RightsizerMetrics;
use crate::runtime::{ResizeRequest, ResizeRuntime};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared state every worker applies plans through
pub(crate) struct Applier {
    pub runtime: Arc<dyn ResizeRuntime>,
    pub locks: PodLocks,
    pub timeout: Duration,
    pub dry_run: bool,
    pub metrics: RightsizerMetrics,
}

/// Status per dimension while an outcome is being assembled
struct Statuses {
    cpu: DimensionStatus,
    memory: DimensionStatus,
}

impl Statuses {
    fn new() -> Self {
        Self {
            cpu: DimensionStatus::Skipped(SkipReason::NoChange),
            memory: DimensionStatus::Skipped(SkipReason::NoChange),
        }
    }

    fn set(&mut self, dimension: ResourceDimension, status: DimensionStatus) {
        match dimension {
            ResourceDimension::Cpu => self.cpu = status,
            ResourceDimension::Memory => self.memory = status,
        }
    }

    fn set_all(&mut self, dimensions: &[ResourceDimension], status: DimensionStatus) {
        for dimension in dimensions {
            self.set(*dimension, status.clone());
        }
    }

    fn into_outcome(self, plan: ResizePlan) -> ResizeOutcome {
        ResizeOutcome {
            plan,
            cpu: self.cpu,
            memory: self.memory,
            applied_at: Utc::now(),
        }
    }
}

/// Outcome for a plan whose worker died before reporting
pub(crate) fn aborted_outcome(plan: ResizePlan) -> ResizeOutcome {
    let mut statuses = Statuses::new();
    statuses.set_all(
        &plan.changing_dimensions(),
        DimensionStatus::Failed("resize worker aborted".to_string()),
    );
    statuses.into_outcome(plan)
}

impl Applier {
    /// Apply one plan and produce its terminal outcome
    pub async fn apply(&self, plan: ResizePlan) -> ResizeOutcome {
        let changing = plan.changing_dimensions();
        let mut statuses = Statuses::new();

        if changing.is_empty() {
            return statuses.into_outcome(plan);
        }

        if self.dry_run {
            statuses.set_all(&changing, DimensionStatus::Skipped(SkipReason::DryRun));
            return statuses.into_outcome(plan);
        }

        let _guard = self.locks.acquire(plan.pod()).await;

        match self.attempt(&plan, &changing).await {
            Ok(()) => statuses.set_all(&changing, DimensionStatus::Applied),
            Err(RuntimeError::Rejected { dimensions, reason }) => {
                self.handle_rejection(&plan, &changing, &dimensions, &reason, &mut statuses)
                    .await
            }
            Err(e) => statuses.set_all(&changing, DimensionStatus::Failed(e.to_string())),
        }

        statuses.into_outcome(plan)
    }

    async fn handle_rejection(
        &self,
        plan: &ResizePlan,
        attempted: &[ResourceDimension],
        rejected: &[ResourceDimension],
        reason: &str,
        statuses: &mut Statuses,
    ) {
        // Only a rejected decrease is a recognizable structural refusal
        let refused: Vec<ResourceDimension> = attempted
            .iter()
            .copied()
            .filter(|d| rejected.contains(d) && plan.decision(*d).is_decrease())
            .collect();

        if refused.is_empty() {
            warn!(
                container = %plan.container,
                rejected = ?rejected,
                reason = %reason,
                "Rejection names no decreasing dimension, treating as failure"
            );
            statuses.set_all(attempted, DimensionStatus::Failed(reason.to_string()));
            return;
        }

        statuses.set_all(
            &refused,
            DimensionStatus::Skipped(SkipReason::DecreaseNotPermitted),
        );

        let permitted: Vec<ResourceDimension> = attempted
            .iter()
            .copied()
            .filter(|d| !refused.contains(d))
            .collect();

        if permitted.is_empty() {
            return;
        }

        debug!(
            container = %plan.container,
            refused = ?refused,
            retrying = ?permitted,
            "Retrying resize with permitted dimensions"
        );

        match self.attempt(plan, &permitted).await {
            Ok(()) => statuses.set_all(&permitted, DimensionStatus::Applied),
            Err(e) => statuses.set_all(&permitted, DimensionStatus::Failed(e.to_string())),
        }
    }

    /// One bounded call to the runtime
    async fn attempt(
        &self,
        plan: &ResizePlan,
        dimensions: &[ResourceDimension],
    ) -> Result<(), RuntimeError> {
        let request = ResizeRequest::for_dimensions(plan, dimensions);
        let started = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.runtime.apply(&request)).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Timeout(self.timeout)),
        };

        self.metrics
            .observe_apply_latency(started.elapsed().as_secs_f64());
        result
    }
}
