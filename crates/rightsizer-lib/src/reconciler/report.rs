//! Result reporting

use crate::error::CycleError;
use crate::models::{CycleReport, ResourceDimension};
use crate::observability::{RightsizerMetrics, StructuredLogger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Consumer of the per-cycle summary
#[async_trait]
pub trait ResultReporter: Send + Sync {
    /// Called once per completed cycle
    async fn report(&self, report: &CycleReport);

    /// Called once per cycle that failed as a whole
    async fn report_failure(&self, at: DateTime<Utc>, error: &CycleError);
}

/// Reporter writing structured log events and Prometheus metrics
#[derive(Clone)]
pub struct LogReporter {
    logger: StructuredLogger,
    metrics: RightsizerMetrics,
}

impl LogReporter {
    pub fn new(logger: StructuredLogger) -> Self {
        Self {
            logger,
            metrics: RightsizerMetrics::new(),
        }
    }
}

#[async_trait]
impl ResultReporter for LogReporter {
    async fn report(&self, report: &CycleReport) {
        self.metrics
            .set_containers_evaluated(report.total_containers_evaluated);
        self.metrics.set_plans_built(report.plans_built);
        if report.plans_deferred > 0 {
            self.metrics.inc_plans_deferred(report.plans_deferred);
        }

        for outcome in &report.outcomes {
            for dimension in ResourceDimension::ALL {
                if outcome.plan.decision(dimension).is_change() {
                    self.metrics
                        .inc_outcome(dimension, outcome.status(dimension));
                }
            }
            self.logger.log_outcome(outcome);
        }

        self.logger.log_cycle_completed(report);
    }

    async fn report_failure(&self, _at: DateTime<Utc>, error: &CycleError) {
        self.metrics.inc_cycle_failures();
        self.logger.log_cycle_failed(error);
    }
}
