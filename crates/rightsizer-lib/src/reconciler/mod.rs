//! Reconciliation loop
//!
//! Each tick: list targets, sample usage, classify, build plans, execute,
//! then record cooldowns and hand one consolidated report to the reporter.
//! Ticks never overlap; a tick that fires during a running cycle is skipped.

mod report;


pub use report::{LogReporter, ResultReporter};

use crate::engine::DecisionEngine;
use crate::error::CycleError;
use crate::executor::BatchExecutor;
use crate::health::{Component, HealthRegistry};
use crate::models::{CycleReport, UsageSample};
use crate::observability::{RightsizerMetrics, StructuredLogger};
use crate::planner::build_plans;
use crate::policy::{ExecutorConfig, Policy};
use crate::provider::UsageProvider;
use crate::runtime::ResizeRuntime;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Drives reconciliation cycles
pub struct Reconciler {
    provider: Arc<dyn UsageProvider>,
    engine: DecisionEngine,
    executor: BatchExecutor,
    policy: Policy,
    reporter: Arc<dyn ResultReporter>,
    health: HealthRegistry,
    metrics: RightsizerMetrics,
    interval: Duration,
}

impl Reconciler {
    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Run one cycle as of `now` without reporting.
    ///
    /// Fails only when no targets could be listed or not a single sample was
    /// obtained for a non-empty target list.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let wall_start = Utc::now();
        let targets = match self.provider.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                self.health
                    .set_degraded(Component::Provider, format!("{:#}", e))
                    .await;
                return Err(CycleError::TargetsUnavailable(format!("{:#}", e)));
            }
        };

        let mut samples: Vec<UsageSample> = Vec::with_capacity(targets.len());
        let mut unavailable = 0usize;
        for target in &targets {
            match self.provider.sample(target).await {
                Ok(Some(sample)) => samples.push(sample),
                Ok(None) => {
                    debug!(container = %target.container, "Usage unavailable, skipping this cycle");
                    unavailable += 1;
                }
                Err(e) => {
                    warn!(container = %target.container, error = %e, "Failed to sample usage");
                    unavailable += 1;
                }
            }
        }

        if !targets.is_empty() && samples.is_empty() {
            self.health
                .set_degraded(Component::Provider, "no usage samples available")
                .await;
            return Err(CycleError::NoSamples {
                targets: targets.len(),
            });
        }
        self.health.set_healthy(Component::Provider).await;

        let decisions: Vec<_> = samples
            .iter()
            .map(|sample| self.engine.classify_container(sample, &self.policy, now))
            .collect();
        let plans = build_plans(decisions);
        let plans_built = plans.len();

        let summary = self.executor.execute(plans).await;

        // Cooldown starts only for dimensions that actually changed, at the
        // moment they were applied
        for outcome in &summary.outcomes {
            let applied_at = on_cycle_clock(now, wall_start, outcome.applied_at);
            for dimension in outcome.plan.changing_dimensions() {
                if outcome.status(dimension).is_applied() {
                    self.engine
                        .record_applied(&outcome.plan.container, dimension, applied_at);
                }
            }
        }
        let pruned = self.engine.prune_cooldowns(now, &self.policy);
        if pruned > 0 {
            debug!(pruned, "Pruned expired cooldown entries");
        }

        if summary.outcomes.iter().any(|o| o.any_failed()) {
            self.health
                .set_degraded(Component::Executor, "resize failures in last cycle")
                .await;
        } else {
            self.health.set_healthy(Component::Executor).await;
        }

        Ok(CycleReport {
            cycle_timestamp: now,
            total_containers_evaluated: samples.len(),
            samples_unavailable: unavailable,
            plans_built,
            plans_deferred: summary.deferred.len(),
            outcomes: summary.outcomes,
        })
    }

    /// Run one cycle now and report it
    pub async fn reconcile_once(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let now = Utc::now();
        let result = self.run_cycle(now).await;
        self.metrics
            .observe_cycle_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(report) => {
                self.reporter.report(report).await;
                self.health.record_cycle_success(now).await;
            }
            Err(e) => {
                self.reporter.report_failure(now, e).await;
                self.health.record_cycle_failure(now, e.to_string()).await;
            }
        }

        result
    }

    /// Run cycles on the configured interval until shutdown.
    ///
    /// A shutdown received mid-cycle takes effect once the cycle finishes.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            dry_run = self.executor.config().dry_run,
            "Starting reconciliation loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.health.set_ready(true);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are reported inside; the loop always continues
                    let _ = self.reconcile_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down reconciliation loop");
                    break;
                }
            }
        }
    }
}

/// Place a wall-clock instant observed during the cycle on the cycle's clock,
/// which started at `now` when the wall clock read `wall_start`
fn on_cycle_clock(
    now: DateTime<Utc>,
    wall_start: DateTime<Utc>,
    observed: DateTime<Utc>,
) -> DateTime<Utc> {
    let elapsed = (observed - wall_start).max(chrono::Duration::zero());
    now.checked_add_signed(elapsed).unwrap_or(now)
}

/// Builder for the reconciler
pub struct ReconcilerBuilder {
    provider: Option<Arc<dyn UsageProvider>>,
    runtime: Option<Arc<dyn ResizeRuntime>>,
    reporter: Option<Arc<dyn ResultReporter>>,
    health: Option<HealthRegistry>,
    policy: Policy,
    executor: ExecutorConfig,
    interval: Duration,
}

impl ReconcilerBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            runtime: None,
            reporter: None,
            health: None,
            policy: Policy::default(),
            executor: ExecutorConfig::default(),
            interval: Duration::from_secs(30),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn UsageProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn ResizeRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ResultReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Validate configuration and build the reconciler
    pub fn build(self) -> Result<Reconciler> {
        let provider = self
            .provider
            .ok_or_else(|| anyhow::anyhow!("Usage provider is required"))?;
        let runtime = self
            .runtime
            .ok_or_else(|| anyhow::anyhow!("Resize runtime is required"))?;

        self.policy.validate()?;
        self.executor.validate()?;
        if self.interval.is_zero() {
            anyhow::bail!("Reconcile interval must be non-zero");
        }

        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(LogReporter::new(StructuredLogger::new("right-sizer"))));

        Ok(Reconciler {
            provider,
            engine: DecisionEngine::new(),
            executor: BatchExecutor::new(runtime, self.executor),
            policy: self.policy,
            reporter,
            health: self.health.unwrap_or_default(),
            metrics: RightsizerMetrics::new(),
            interval: self.interval,
        })
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
