//! Observability infrastructure for the right-sizer
//!
//! Provides:
//! - Prometheus metrics (cycle duration, apply latency, plan and outcome counts)
//! - Structured JSON logging with tracing

use crate::error::CycleError;
use crate::models::{CycleReport, DimensionStatus, ResizeOutcome, ResourceDimension};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Histogram buckets for apply calls against the API server (in seconds)
const APPLY_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Histogram buckets for whole reconciliation cycles (in seconds)
const CYCLE_DURATION_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RightsizerMetricsInner> = OnceLock::new();

struct RightsizerMetricsInner {
    cycle_duration_seconds: Histogram,
    apply_latency_seconds: Histogram,
    containers_evaluated: IntGauge,
    plans_built: IntGauge,
    resize_outcomes: IntCounterVec,
    cycle_failures: IntCounter,
    plans_deferred: IntCounter,
}

impl RightsizerMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "rightsizer_cycle_duration_seconds",
                "Time spent on one reconciliation cycle",
                CYCLE_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            apply_latency_seconds: register_histogram!(
                "rightsizer_apply_latency_seconds",
                "Time spent on a single resize apply attempt",
                APPLY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register apply_latency_seconds"),

            containers_evaluated: register_int_gauge!(
                "rightsizer_containers_evaluated",
                "Containers evaluated in the last cycle"
            )
            .expect("Failed to register containers_evaluated"),

            plans_built: register_int_gauge!(
                "rightsizer_plans_built",
                "Resize plans built in the last cycle"
            )
            .expect("Failed to register plans_built"),

            resize_outcomes: register_int_counter_vec!(
                "rightsizer_resize_outcomes_total",
                "Per-dimension resize outcomes",
                &["dimension", "status"]
            )
            .expect("Failed to register resize_outcomes"),

            cycle_failures: register_int_counter!(
                "rightsizer_cycle_failures_total",
                "Reconciliation cycles that failed as a whole"
            )
            .expect("Failed to register cycle_failures"),

            plans_deferred: register_int_counter!(
                "rightsizer_plans_deferred_total",
                "Plans deferred to the next cycle by the cycle deadline"
            )
            .expect("Failed to register plans_deferred"),
        }
    }
}

/// Right-sizer metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct RightsizerMetrics {
    _private: (),
}

impl Default for RightsizerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RightsizerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RightsizerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RightsizerMetricsInner {
        GLOBAL_METRICS.get_or_init(RightsizerMetricsInner::new)
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn observe_apply_latency(&self, duration_secs: f64) {
        self.inner().apply_latency_seconds.observe(duration_secs);
    }

    pub fn set_containers_evaluated(&self, count: usize) {
        self.inner().containers_evaluated.set(count as i64);
    }

    pub fn set_plans_built(&self, count: usize) {
        self.inner().plans_built.set(count as i64);
    }

    /// Count one dimension outcome
    pub fn inc_outcome(&self, dimension: ResourceDimension, status: &DimensionStatus) {
        self.inner()
            .resize_outcomes
            .with_label_values(&[dimension.as_str(), status.label()])
            .inc();
    }

    pub fn inc_cycle_failures(&self) {
        self.inner().cycle_failures.inc();
    }

    pub fn inc_plans_deferred(&self, count: usize) {
        self.inner().plans_deferred.inc_by(count as u64);
    }
}

/// Structured logger for operator events
///
/// Emits one JSON event per lifecycle step and per non-trivial resize
/// outcome, each tagged with an `event` field.
#[derive(Clone)]
pub struct StructuredLogger {
    operator: String,
}

impl StructuredLogger {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
        }
    }

    /// Log operator startup
    pub fn log_startup(&self, version: &str, dry_run: bool, interval: Duration) {
        info!(
            event = "operator_started",
            operator = %self.operator,
            version = %version,
            dry_run = dry_run,
            interval_secs = interval.as_secs(),
            "Right-sizer started"
        );
    }

    /// Log operator shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "operator_shutdown",
            operator = %self.operator,
            reason = %reason,
            "Right-sizer shutting down"
        );
    }

    /// Log the consolidated summary of a finished cycle
    pub fn log_cycle_completed(&self, report: &CycleReport) {
        info!(
            event = "cycle_completed",
            operator = %self.operator,
            cycle_timestamp = %report.cycle_timestamp.to_rfc3339(),
            containers_evaluated = report.total_containers_evaluated,
            samples_unavailable = report.samples_unavailable,
            plans_built = report.plans_built,
            plans_deferred = report.plans_deferred,
            applied = report.count_status("applied"),
            skipped = report.count_status("skipped"),
            failed = report.count_status("failed"),
            "Reconciliation cycle completed"
        );
    }

    pub fn log_cycle_failed(&self, error: &CycleError) {
        warn!(
            event = "cycle_failed",
            operator = %self.operator,
            error = %error,
            "Reconciliation cycle failed"
        );
    }

    /// Log every dimension of an outcome that is not a plain NoChange skip
    pub fn log_outcome(&self, outcome: &ResizeOutcome) {
        for dimension in ResourceDimension::ALL {
            let decision = outcome.plan.decision(dimension);
            match outcome.status(dimension) {
                DimensionStatus::Applied => info!(
                    event = "resize_applied",
                    operator = %self.operator,
                    container = %outcome.plan.container,
                    dimension = %dimension,
                    verdict = %decision.verdict,
                    from = decision.current_value,
                    to = decision.target_value,
                    utilization = decision.utilization_ratio,
                    "Resize applied"
                ),
                DimensionStatus::Skipped(reason) if decision.is_change() => info!(
                    event = "resize_skipped",
                    operator = %self.operator,
                    container = %outcome.plan.container,
                    dimension = %dimension,
                    verdict = %decision.verdict,
                    reason = %reason,
                    "Resize skipped"
                ),
                DimensionStatus::Skipped(_) => debug!(
                    container = %outcome.plan.container,
                    dimension = %dimension,
                    "Dimension unchanged"
                ),
                DimensionStatus::Failed(reason) => warn!(
                    event = "resize_failed",
                    operator = %self.operator,
                    container = %outcome.plan.container,
                    dimension = %dimension,
                    verdict = %decision.verdict,
                    from = decision.current_value,
                    to = decision.target_value,
                    reason = %reason,
                    "Resize failed"
                ),
            }
        }
    }
}
