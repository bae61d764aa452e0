//! Threshold classification of a usage sample
//!
//! Each dimension is classified independently against its baseline (limit,
//! or request when no limit is set). The resulting target is clamped to the
//! policy bounds and must move strictly in the verdict's direction, otherwise
//! the verdict degrades to NoChange.

use super::CooldownTracker;
use crate::models::{
    ContainerDecisions, ContainerRef, ResourceDecision, ResourceDimension, ResourceSpec,
    UsageSample, Verdict,
};
use crate::policy::Policy;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// Classify one dimension, ignoring cooldown
pub fn classify_dimension(
    dimension: ResourceDimension,
    usage: u64,
    spec: ResourceSpec,
    policy: &Policy,
) -> ResourceDecision {
    let current = spec.baseline();

    // No baseline means unbounded: nothing to measure against
    if current == 0 {
        return ResourceDecision::no_change(dimension, current, 0.0);
    }

    let ratio = usage as f64 / current as f64;
    // Scale before dividing so whole-percent boundaries compare exactly
    let utilization_pct = usage as f64 * 100.0 / current as f64;

    let verdict = if utilization_pct > policy.upper_threshold_pct {
        Verdict::ScaleUp
    } else if utilization_pct < policy.lower_threshold_pct {
        Verdict::ScaleDown
    } else {
        return ResourceDecision::no_change(dimension, current, ratio);
    };

    let target = step_target(usage, policy.step_multiplier, policy, dimension);

    let moves_in_direction = match verdict {
        Verdict::ScaleUp => target > current,
        Verdict::ScaleDown => target < current,
        Verdict::NoChange => false,
    };

    if !moves_in_direction {
        trace!(
            dimension = %dimension,
            current,
            target,
            "Clamped target does not move in verdict direction"
        );
        return ResourceDecision::no_change(dimension, current, ratio);
    }

    ResourceDecision {
        dimension,
        verdict,
        current_value: current,
        target_value: target,
        utilization_ratio: ratio,
    }
}

/// usage * multiplier, clamped to the dimension bounds
fn step_target(usage: u64, multiplier: f64, policy: &Policy, dimension: ResourceDimension) -> u64 {
    // f64 -> u64 casts saturate, so huge products land on u64::MAX before clamping
    let raw = (usage as f64 * multiplier).round() as u64;
    policy.bounds(dimension).clamp(raw)
}

/// Scaling decision engine
///
/// Owns the cooldown state; classification only reads it, so calling
/// [`DecisionEngine::classify`] repeatedly with the same inputs is idempotent.
/// Use a fresh engine per test for isolation.
#[derive(Debug, Default)]
pub struct DecisionEngine {
    cooldown: CooldownTracker,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self {
            cooldown: CooldownTracker::new(),
        }
    }

    /// Classify both dimensions of a sample as of `now`
    pub fn classify(
        &self,
        sample: &UsageSample,
        policy: &Policy,
        now: DateTime<Utc>,
    ) -> (ResourceDecision, ResourceDecision) {
        let cpu = self.classify_with_cooldown(sample, ResourceDimension::Cpu, policy, now);
        let memory = self.classify_with_cooldown(sample, ResourceDimension::Memory, policy, now);
        (cpu, memory)
    }

    /// Classify a sample into the aggregate consumed by the plan builder
    pub fn classify_container(
        &self,
        sample: &UsageSample,
        policy: &Policy,
        now: DateTime<Utc>,
    ) -> ContainerDecisions {
        let (cpu, memory) = self.classify(sample, policy, now);
        ContainerDecisions {
            container: sample.container.clone(),
            cpu,
            memory,
            cpu_spec: sample.cpu,
            memory_spec: sample.memory,
        }
    }

    fn classify_with_cooldown(
        &self,
        sample: &UsageSample,
        dimension: ResourceDimension,
        policy: &Policy,
        now: DateTime<Utc>,
    ) -> ResourceDecision {
        let (usage, spec) = sample.dimension(dimension);
        let decision = classify_dimension(dimension, usage, spec, policy);

        if decision.is_change()
            && self
                .cooldown
                .is_cooling_down(&sample.container, dimension, now, policy.cooldown())
        {
            debug!(
                container = %sample.container,
                dimension = %dimension,
                verdict = %decision.verdict,
                "Suppressing change during cooldown"
            );
            return ResourceDecision::no_change(
                dimension,
                decision.current_value,
                decision.utilization_ratio,
            );
        }

        decision
    }

    /// Record that a dimension change was applied, starting its cooldown
    pub fn record_applied(
        &self,
        container: &ContainerRef,
        dimension: ResourceDimension,
        at: DateTime<Utc>,
    ) {
        self.cooldown.record(container, dimension, at);
    }

    /// Forget cooldown entries that no longer affect decisions
    pub fn prune_cooldowns(&self, now: DateTime<Utc>, policy: &Policy) -> usize {
        self.cooldown.prune(now, policy.cooldown())
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldown
    }
}
