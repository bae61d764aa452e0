//! Core data models for the right-sizer
//!
//! Every type here is cycle-scoped: built when a reconciliation cycle starts
//! and dropped when it ends. The only state that outlives a cycle is the
//! cooldown tracker owned by the decision engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a pod (namespace + name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl PodRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of a container inside a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef {
    pub pod: PodRef,
    pub container: String,
}

impl ContainerRef {
    pub fn new(pod: PodRef, container: impl Into<String>) -> Self {
        Self {
            pod,
            container: container.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod, self.container)
    }
}

/// Configured request/limit pair for one resource dimension.
///
/// Zero means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub request: u64,
    pub limit: u64,
}

impl ResourceSpec {
    pub fn new(request: u64, limit: u64) -> Self {
        Self { request, limit }
    }

    /// The value utilization is measured against: the limit when set,
    /// otherwise the request.
    pub fn baseline(&self) -> u64 {
        if self.limit > 0 {
            self.limit
        } else {
            self.request
        }
    }

    pub fn is_unset(&self) -> bool {
        self.request == 0 && self.limit == 0
    }
}

/// A container the provider tracks this cycle, with its configured resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTarget {
    pub container: ContainerRef,
    /// CPU request/limit in millicores
    pub cpu: ResourceSpec,
    /// Memory request/limit in bytes
    pub memory: ResourceSpec,
}

/// Usage observed for one container, produced once per cycle by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub container: ContainerRef,
    pub cpu_usage_millicores: u64,
    pub memory_usage_bytes: u64,
    pub cpu: ResourceSpec,
    pub memory: ResourceSpec,
}

impl UsageSample {
    /// Usage and configured spec for the given dimension
    pub fn dimension(&self, dimension: ResourceDimension) -> (u64, ResourceSpec) {
        match dimension {
            ResourceDimension::Cpu => (self.cpu_usage_millicores, self.cpu),
            ResourceDimension::Memory => (self.memory_usage_bytes, self.memory),
        }
    }
}

/// Resource dimension a decision applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDimension {
    Cpu,
    Memory,
}

impl ResourceDimension {
    pub const ALL: [ResourceDimension; 2] = [ResourceDimension::Cpu, ResourceDimension::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDimension::Cpu => "cpu",
            ResourceDimension::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaling verdict for one dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    ScaleUp,
    ScaleDown,
    NoChange,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::ScaleUp => write!(f, "scale_up"),
            Verdict::ScaleDown => write!(f, "scale_down"),
            Verdict::NoChange => write!(f, "no_change"),
        }
    }
}

/// Decision for one (container, dimension) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecision {
    pub dimension: ResourceDimension,
    pub verdict: Verdict,
    pub current_value: u64,
    pub target_value: u64,
    pub utilization_ratio: f64,
}

impl ResourceDecision {
    pub fn no_change(dimension: ResourceDimension, current_value: u64, utilization_ratio: f64) -> Self {
        Self {
            dimension,
            verdict: Verdict::NoChange,
            current_value,
            target_value: current_value,
            utilization_ratio,
        }
    }

    pub fn is_change(&self) -> bool {
        self.verdict != Verdict::NoChange
    }

    /// True when the target lowers the current value
    pub fn is_decrease(&self) -> bool {
        self.target_value < self.current_value
    }
}

/// Both dimension decisions for one container, plus the resource spec they were made against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDecisions {
    pub container: ContainerRef,
    pub cpu: ResourceDecision,
    pub memory: ResourceDecision,
    pub cpu_spec: ResourceSpec,
    pub memory_spec: ResourceSpec,
}

/// Planned resize for a container with at least one changing dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizePlan {
    pub container: ContainerRef,
    pub cpu: ResourceDecision,
    pub memory: ResourceDecision,
    pub cpu_spec: ResourceSpec,
    pub memory_spec: ResourceSpec,
}

impl ResizePlan {
    pub fn pod(&self) -> &PodRef {
        &self.container.pod
    }

    pub fn decision(&self, dimension: ResourceDimension) -> &ResourceDecision {
        match dimension {
            ResourceDimension::Cpu => &self.cpu,
            ResourceDimension::Memory => &self.memory,
        }
    }

    pub fn spec(&self, dimension: ResourceDimension) -> ResourceSpec {
        match dimension {
            ResourceDimension::Cpu => self.cpu_spec,
            ResourceDimension::Memory => self.memory_spec,
        }
    }

    /// Dimensions whose verdict is not NoChange, in CPU-then-memory order
    pub fn changing_dimensions(&self) -> Vec<ResourceDimension> {
        ResourceDimension::ALL
            .into_iter()
            .filter(|d| self.decision(*d).is_change())
            .collect()
    }
}

/// Why a dimension was deliberately not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The plan did not change this dimension
    NoChange,
    /// The runtime refuses to lower this value without a restart
    DecreaseNotPermitted,
    /// Dry run mode, nothing was sent to the runtime
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoChange => write!(f, "no change planned"),
            SkipReason::DecreaseNotPermitted => write!(f, "decrease not permitted in place"),
            SkipReason::DryRun => write!(f, "dry run"),
        }
    }
}

/// Terminal status of one dimension of a resize attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DimensionStatus {
    Applied,
    Skipped(SkipReason),
    Failed(String),
}

impl DimensionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DimensionStatus::Applied => "applied",
            DimensionStatus::Skipped(_) => "skipped",
            DimensionStatus::Failed(_) => "failed",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, DimensionStatus::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DimensionStatus::Failed(_))
    }
}

/// Result of attempting one plan. Written once by the executor, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeOutcome {
    pub plan: ResizePlan,
    pub cpu: DimensionStatus,
    pub memory: DimensionStatus,
    pub applied_at: DateTime<Utc>,
}

impl ResizeOutcome {
    pub fn status(&self, dimension: ResourceDimension) -> &DimensionStatus {
        match dimension {
            ResourceDimension::Cpu => &self.cpu,
            ResourceDimension::Memory => &self.memory,
        }
    }

    pub fn any_applied(&self) -> bool {
        self.cpu.is_applied() || self.memory.is_applied()
    }

    pub fn any_failed(&self) -> bool {
        self.cpu.is_failed() || self.memory.is_failed()
    }
}

/// Structured summary handed to the result reporter once per cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_timestamp: DateTime<Utc>,
    pub total_containers_evaluated: usize,
    pub samples_unavailable: usize,
    pub plans_built: usize,
    /// Plans not attempted because the cycle deadline passed
    pub plans_deferred: usize,
    pub outcomes: Vec<ResizeOutcome>,
}

impl CycleReport {
    pub fn count_status(&self, label: &str) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| [&o.cpu, &o.memory])
            .filter(|s| s.label() == label)
            .count()
    }
}
