//! Workload runtime the executor applies resizes against
//!
//! The runtime receives one combined patch per attempt and must report back
//! whether it fully succeeded, structurally rejected specific dimensions, or
//! failed outright.

mod kubernetes;

pub use kubernetes::{classify_api_error, KubeResizeRuntime};

use crate::error::RuntimeError;
use crate::models::{ContainerRef, ResizePlan, ResourceDimension};
use async_trait::async_trait;

/// New request/limit values for one dimension. `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionPatch {
    pub dimension: ResourceDimension,
    pub request: Option<u64>,
    pub limit: Option<u64>,
    /// True when the change lowers the configured value
    pub decrease: bool,
}

impl DimensionPatch {
    /// Patch for one dimension of a plan.
    ///
    /// The target replaces the baseline field (limit, or request when no limit
    /// is set). A request above a lowered limit is brought down with it, and a
    /// request equal to the limit follows it in both directions.
    pub fn from_plan(plan: &ResizePlan, dimension: ResourceDimension) -> Self {
        let decision = plan.decision(dimension);
        let spec = plan.spec(dimension);
        let target = decision.target_value;

        // Guaranteed pods keep request == limit
        let (request, limit) = if spec.limit > 0 {
            let guaranteed = spec.request == spec.limit;
            let request = (guaranteed || spec.request > target).then_some(target);
            (request, Some(target))
        } else {
            (Some(target), None)
        };

        Self {
            dimension,
            request,
            limit,
            decrease: decision.is_decrease(),
        }
    }
}

/// One apply attempt against a single container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeRequest {
    pub container: ContainerRef,
    pub patches: Vec<DimensionPatch>,
}

impl ResizeRequest {
    pub fn for_dimensions(plan: &ResizePlan, dimensions: &[ResourceDimension]) -> Self {
        Self {
            container: plan.container.clone(),
            patches: dimensions
                .iter()
                .map(|d| DimensionPatch::from_plan(plan, *d))
                .collect(),
        }
    }

    pub fn dimensions(&self) -> Vec<ResourceDimension> {
        self.patches.iter().map(|p| p.dimension).collect()
    }

    pub fn decreasing_dimensions(&self) -> Vec<ResourceDimension> {
        self.patches
            .iter()
            .filter(|p| p.decrease)
            .map(|p| p.dimension)
            .collect()
    }
}

/// Trait for in-place resize implementations
#[async_trait]
pub trait ResizeRuntime: Send + Sync {
    /// Apply every patch in the request as one combined operation
    async fn apply(&self, request: &ResizeRequest) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PodRef, ResourceDecision, ResourceSpec, Verdict};

    fn plan(cpu_spec: ResourceSpec, cpu_target: u64) -> ResizePlan {
        let current = cpu_spec.baseline();
        ResizePlan {
            container: ContainerRef::new(PodRef::new("default", "web-0"), "app"),
            cpu: ResourceDecision {
                dimension: ResourceDimension::Cpu,
                verdict: if cpu_target > current {
                    Verdict::ScaleUp
                } else {
                    Verdict::ScaleDown
                },
                current_value: current,
                target_value: cpu_target,
                utilization_ratio: 0.5,
            },
            memory: ResourceDecision::no_change(ResourceDimension::Memory, 512, 0.5),
            cpu_spec,
            memory_spec: ResourceSpec::new(256, 512),
        }
    }

    #[test]
    fn test_patch_targets_limit_when_set() {
        let patch = DimensionPatch::from_plan(
            &plan(ResourceSpec::new(500, 1000), 1500),
            ResourceDimension::Cpu,
        );
        assert_eq!(patch.limit, Some(1500));
        assert_eq!(patch.request, None);
        assert!(!patch.decrease);
    }

    #[test]
    fn test_patch_lowers_request_with_limit() {
        let patch = DimensionPatch::from_plan(
            &plan(ResourceSpec::new(800, 1000), 400),
            ResourceDimension::Cpu,
        );
        assert_eq!(patch.limit, Some(400));
        assert_eq!(patch.request, Some(400));
        assert!(patch.decrease);
    }

    #[test]
    fn test_patch_keeps_guaranteed_request_with_limit() {
        let up = DimensionPatch::from_plan(
            &plan(ResourceSpec::new(1000, 1000), 1500),
            ResourceDimension::Cpu,
        );
        assert_eq!(up.request, Some(1500));
        assert_eq!(up.limit, Some(1500));

        let down = DimensionPatch::from_plan(
            &plan(ResourceSpec::new(1000, 1000), 600),
            ResourceDimension::Cpu,
        );
        assert_eq!(down.request, Some(600));
        assert_eq!(down.limit, Some(600));
        assert!(down.decrease);
    }

    #[test]
    fn test_patch_targets_request_without_limit() {
        let patch = DimensionPatch::from_plan(
            &plan(ResourceSpec::new(1000, 0), 1500),
            ResourceDimension::Cpu,
        );
        assert_eq!(patch.request, Some(1500));
        assert_eq!(patch.limit, None);
    }

    #[test]
    fn test_request_dimensions() {
        let p = plan(ResourceSpec::new(800, 1000), 400);
        let request = ResizeRequest::for_dimensions(&p, &[ResourceDimension::Cpu]);
        assert_eq!(request.dimensions(), vec![ResourceDimension::Cpu]);
        assert_eq!(request.decreasing_dimensions(), vec![ResourceDimension::Cpu]);
    }
}
