//! Scaling policy and executor settings
//!
//! Both structs are loaded and validated once at start-up, then handed to
//! the engine and executor as immutable values for every cycle.

use crate::error::ConfigError;
use crate::models::ResourceDimension;
use serde::Deserialize;
use std::time::Duration;

/// Default scale-up threshold (80% of baseline)
pub const DEFAULT_UPPER_THRESHOLD_PCT: f64 = 80.0;

/// Default scale-down threshold (30% of baseline)
pub const DEFAULT_LOWER_THRESHOLD_PCT: f64 = 30.0;

const MIB: u64 = 1024 * 1024;

/// Inclusive bounds for a dimension's target value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
}

impl Bounds {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: u64) -> u64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Scaling policy consumed by the decision engine
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Policy {
    /// Utilization (percent of baseline) above which a dimension scales up
    #[serde(default = "default_upper_threshold")]
    pub upper_threshold_pct: f64,

    /// Utilization (percent of baseline) below which a dimension scales down
    #[serde(default = "default_lower_threshold")]
    pub lower_threshold_pct: f64,

    /// CPU bounds in millicores
    #[serde(default = "default_cpu_bounds")]
    pub cpu: Bounds,

    /// Memory bounds in bytes
    #[serde(default = "default_memory_bounds")]
    pub memory: Bounds,

    /// Minimum time between applied changes of the same (container, dimension)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Target = usage * step_multiplier, before clamping
    #[serde(default = "default_step_multiplier")]
    pub step_multiplier: f64,
}

fn default_upper_threshold() -> f64 {
    DEFAULT_UPPER_THRESHOLD_PCT
}

fn default_lower_threshold() -> f64 {
    DEFAULT_LOWER_THRESHOLD_PCT
}

fn default_cpu_bounds() -> Bounds {
    Bounds::new(10, 4000)
}

fn default_memory_bounds() -> Bounds {
    Bounds::new(64 * MIB, 8192 * MIB)
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_step_multiplier() -> f64 {
    1.2
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            upper_threshold_pct: default_upper_threshold(),
            lower_threshold_pct: default_lower_threshold(),
            cpu: default_cpu_bounds(),
            memory: default_memory_bounds(),
            cooldown_secs: default_cooldown_secs(),
            step_multiplier: default_step_multiplier(),
        }
    }
}

impl Policy {
    pub fn bounds(&self, dimension: ResourceDimension) -> Bounds {
        match dimension {
            ResourceDimension::Cpu => self.cpu,
            ResourceDimension::Memory => self.memory,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Reject configurations the engine is not prepared to handle
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pct in [self.upper_threshold_pct, self.lower_threshold_pct] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(ConfigError::ThresholdRange(pct));
            }
        }
        if self.upper_threshold_pct <= self.lower_threshold_pct {
            return Err(ConfigError::ThresholdOrder {
                upper: self.upper_threshold_pct,
                lower: self.lower_threshold_pct,
            });
        }
        for dimension in ResourceDimension::ALL {
            let bounds = self.bounds(dimension);
            if bounds.min > bounds.max {
                return Err(ConfigError::Bounds {
                    dimension,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
        if !self.step_multiplier.is_finite() || self.step_multiplier <= 0.0 {
            return Err(ConfigError::StepMultiplier(self.step_multiplier));
        }
        Ok(())
    }
}

/// Settings for the batch resize executor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum plans per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum in-flight apply operations within a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-operation timeout in milliseconds
    #[serde(default = "default_apply_timeout_ms")]
    pub apply_timeout_ms: u64,

    /// Cycle deadline in seconds; batches not started by then are deferred
    #[serde(default)]
    pub cycle_deadline_secs: Option<u64>,

    /// Pause between batches in milliseconds
    #[serde(default)]
    pub delay_between_batches_ms: u64,

    /// Compute and report plans without touching the runtime
    #[serde(default)]
    pub dry_run: bool,
}

fn default_batch_size() -> usize {
    3
}

fn default_concurrency() -> usize {
    3
}

fn default_apply_timeout_ms() -> u64 {
    10_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            apply_timeout_ms: default_apply_timeout_ms(),
            cycle_deadline_secs: None,
            delay_between_batches_ms: 0,
            dry_run: false,
        }
    }
}

impl ExecutorConfig {
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    pub fn cycle_deadline(&self) -> Option<Duration> {
        self.cycle_deadline_secs.map(Duration::from_secs)
    }

    pub fn delay_between_batches(&self) -> Duration {
        Duration::from_millis(self.delay_between_batches_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroSize("batch_size"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroSize("concurrency"));
        }
        if self.apply_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Namespaces the provider is allowed to target
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamespaceFilter {
    /// When non-empty, only these namespaces are processed
    #[serde(default)]
    pub include: Vec<String>,

    /// Never processed; takes precedence over `include`
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Cluster system namespaces, always skipped
    #[serde(default = "default_system_namespaces")]
    pub system: Vec<String>,
}

fn default_system_namespaces() -> Vec<String> {
    ["kube-system", "kube-public", "kube-node-lease"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for NamespaceFilter {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            system: default_system_namespaces(),
        }
    }
}

impl NamespaceFilter {
    pub fn allows(&self, namespace: &str) -> bool {
        if self.system.iter().any(|ns| ns == namespace)
            || self.exclude.iter().any(|ns| ns == namespace)
        {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|ns| ns == namespace)
    }
}
