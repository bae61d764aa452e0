//! Usage sample providers
//!
//! A provider hands the reconciler a snapshot of the containers to track this
//! cycle and, per container, a usage sample or "unavailable".

mod metrics_server;
mod selection;

pub use metrics_server::{MetricsServerProvider, PodMetrics, PodMetricsContainer, PodMetricsUsage};
pub use selection::{container_resources, SelfIdentity, TargetSelector};

use crate::models::{ContainerTarget, UsageSample};
use anyhow::Result;
use async_trait::async_trait;

/// Trait for usage sample sources
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Containers to evaluate this cycle
    async fn list_targets(&self) -> Result<Vec<ContainerTarget>>;

    /// Current usage for one container. `Ok(None)` means unavailable this cycle.
    async fn sample(&self, target: &ContainerTarget) -> Result<Option<UsageSample>>;
}
