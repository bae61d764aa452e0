//! Usage provider backed by the Kubernetes metrics API (`metrics.k8s.io`)

use super::{TargetSelector, UsageProvider};
use crate::models::{ContainerRef, ContainerTarget, PodRef, UsageSample};
use crate::quantity::{parse_cpu_millicores, parse_memory_bytes};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams};
use kube::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PodMetricsUsage {
    pub cpu: Quantity,
    pub memory: Quantity,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PodMetricsContainer {
    pub name: String,
    pub usage: PodMetricsUsage,
}

/// `metrics.k8s.io/v1beta1` PodMetrics
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub window: String,
    #[serde(default)]
    pub containers: Vec<PodMetricsContainer>,
}

impl k8s_openapi::Resource for PodMetrics {
    type Scope = k8s_openapi::NamespaceResourceScope;

    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const URL_PATH_SEGMENT: &'static str = "pods";
    const VERSION: &'static str = "v1beta1";
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

impl PodMetrics {
    /// Per-container (millicores, bytes) usage, skipping unparseable entries
    pub fn container_usage(&self) -> Vec<(ContainerRef, u64, u64)> {
        let (Some(namespace), Some(name)) = (
            self.metadata.namespace.as_deref(),
            self.metadata.name.as_deref(),
        ) else {
            return Vec::new();
        };
        let pod = PodRef::new(namespace, name);

        self.containers
            .iter()
            .filter_map(|c| {
                let container = ContainerRef::new(pod.clone(), c.name.clone());
                let usage = parse_cpu_millicores(&c.usage.cpu.0)
                    .and_then(|cpu| Ok((cpu, parse_memory_bytes(&c.usage.memory.0)?)));
                match usage {
                    Ok((cpu, memory)) => Some((container, cpu, memory)),
                    Err(e) => {
                        warn!(container = %container, error = %e, "Unparseable usage in pod metrics");
                        None
                    }
                }
            })
            .collect()
    }
}

/// (cpu millicores, memory bytes)
type Usage = (u64, u64);

/// Provider reading pods from the API server and usage from metrics-server.
///
/// Usage is listed once per `list_targets` call and served from that
/// snapshot by `sample`, so a cycle sees one consistent view.
pub struct MetricsServerProvider {
    client: Client,
    selector: TargetSelector,
    snapshot: RwLock<HashMap<ContainerRef, Usage>>,
}

impl MetricsServerProvider {
    pub fn new(client: Client, selector: TargetSelector) -> Self {
        Self {
            client,
            selector,
            snapshot: RwLock::new(HashMap::new()),
        }
    }

    /// Namespaces to list, or `None` for the whole cluster
    fn scopes(&self) -> Option<Vec<String>> {
        let include = &self.selector.filter().include;
        (!include.is_empty()).then(|| include.clone())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let params = ListParams::default().fields("status.phase=Running");
        match self.scopes() {
            None => {
                let pods: Api<Pod> = Api::all(self.client.clone());
                Ok(pods.list(&params).await.context("Failed to list pods")?.items)
            }
            Some(namespaces) => {
                let mut all = Vec::new();
                for namespace in namespaces {
                    let pods: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
                    let list = pods
                        .list(&params)
                        .await
                        .with_context(|| format!("Failed to list pods in {}", namespace))?;
                    all.extend(list.items);
                }
                Ok(all)
            }
        }
    }

    async fn list_metrics(&self) -> Result<Vec<PodMetrics>> {
        let params = ListParams::default();
        match self.scopes() {
            None => {
                let metrics: Api<PodMetrics> = Api::all(self.client.clone());
                Ok(metrics
                    .list(&params)
                    .await
                    .context("Failed to list pod metrics")?
                    .items)
            }
            Some(namespaces) => {
                let mut all = Vec::new();
                for namespace in namespaces {
                    let metrics: Api<PodMetrics> = Api::namespaced(self.client.clone(), &namespace);
                    let list = metrics
                        .list(&params)
                        .await
                        .with_context(|| format!("Failed to list pod metrics in {}", namespace))?;
                    all.extend(list.items);
                }
                Ok(all)
            }
        }
    }

    async fn refresh_snapshot(&self) {
        let usage: HashMap<ContainerRef, Usage> = match self.list_metrics().await {
            Ok(metrics) => metrics
                .iter()
                .flat_map(PodMetrics::container_usage)
                .map(|(container, cpu, memory)| (container, (cpu, memory)))
                .collect(),
            Err(e) => {
                // Every sample this cycle becomes unavailable
                warn!(error = %e, "Metrics API unavailable");
                HashMap::new()
            }
        };

        debug!(containers = usage.len(), "Refreshed usage snapshot");
        *self.snapshot.write().await = usage;
    }
}

#[async_trait]
impl UsageProvider for MetricsServerProvider {
    async fn list_targets(&self) -> Result<Vec<ContainerTarget>> {
        let pods = self.list_pods().await?;
        let targets: Vec<ContainerTarget> =
            pods.iter().flat_map(|pod| self.selector.select(pod)).collect();

        self.refresh_snapshot().await;

        debug!(pods = pods.len(), containers = targets.len(), "Listed targets");
        Ok(targets)
    }

    async fn sample(&self, target: &ContainerTarget) -> Result<Option<UsageSample>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .get(&target.container)
            .map(|(cpu, memory)| UsageSample {
                container: target.container.clone(),
                cpu_usage_millicores: *cpu,
                memory_usage_bytes: *memory,
                cpu: target.cpu,
                memory: target.memory,
            }))
    }
}
