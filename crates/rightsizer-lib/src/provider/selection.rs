//! Which pods and containers are eligible for right-sizing

use crate::models::{ContainerRef, ContainerTarget, PodRef, ResourceSpec};
use crate::policy::NamespaceFilter;
use crate::error::QuantityError;
use crate::quantity::{parse_cpu_millicores, parse_memory_bytes};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Pod, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const APP_NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label values marking cluster infrastructure pods
const SYSTEM_POD_LABELS: &[(&str, &[&str])] = &[
    (
        "component",
        &["control-plane", "etcd", "kube-scheduler", "kube-controller-manager"],
    ),
    (
        "tier",
        &["control-plane", "etcd", "kube-scheduler", "kube-controller-manager"],
    ),
    ("k8s-app", &["metrics-server"]),
];

/// How the operator recognizes its own pod
#[derive(Debug, Clone, Default)]
pub struct SelfIdentity {
    pub app_name: String,
    pub pod_name: Option<String>,
    pub pod_namespace: Option<String>,
}

impl SelfIdentity {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            pod_name: None,
            pod_namespace: None,
        }
    }

    /// Identity from the downward-API `POD_NAME` / `POD_NAMESPACE` variables
    pub fn from_env(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            pod_name: std::env::var("POD_NAME").ok().filter(|v| !v.is_empty()),
            pod_namespace: std::env::var("POD_NAMESPACE").ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn matches(&self, pod: &Pod) -> bool {
        let labelled = pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(APP_NAME_LABEL))
            .is_some_and(|name| !self.app_name.is_empty() && *name == self.app_name);

        let same_pod = match (&self.pod_name, &self.pod_namespace) {
            (Some(name), Some(namespace)) => {
                pod.metadata.name.as_ref() == Some(name)
                    && pod.metadata.namespace.as_ref() == Some(namespace)
            }
            _ => false,
        };

        labelled || same_pod
    }
}

/// Turns pods into container targets
#[derive(Debug, Clone)]
pub struct TargetSelector {
    filter: NamespaceFilter,
    identity: SelfIdentity,
}

impl TargetSelector {
    pub fn new(filter: NamespaceFilter, identity: SelfIdentity) -> Self {
        Self { filter, identity }
    }

    pub fn filter(&self) -> &NamespaceFilter {
        &self.filter
    }

    /// Whether a pod may be resized at all
    pub fn admits(&self, pod: &Pod) -> bool {
        let Some(namespace) = pod.metadata.namespace.as_deref() else {
            return false;
        };

        let running = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|phase| phase == "Running");

        running
            && pod.metadata.deletion_timestamp.is_none()
            && self.filter.allows(namespace)
            && !is_system_pod(pod)
            && !self.identity.matches(pod)
    }

    /// Container targets for an admitted pod; empty when the pod is excluded
    pub fn select(&self, pod: &Pod) -> Vec<ContainerTarget> {
        if !self.admits(pod) {
            return Vec::new();
        }

        let (Some(namespace), Some(name), Some(spec)) = (
            pod.metadata.namespace.as_deref(),
            pod.metadata.name.as_deref(),
            pod.spec.as_ref(),
        ) else {
            return Vec::new();
        };
        let pod_ref = PodRef::new(namespace, name);

        spec.containers
            .iter()
            .filter_map(|container| {
                let container_ref = ContainerRef::new(pod_ref.clone(), container.name.clone());
                match container_resources(container.resources.as_ref()) {
                    Ok((cpu, memory)) if cpu.is_unset() && memory.is_unset() => {
                        debug!(container = %container_ref, "No resources configured, skipping");
                        None
                    }
                    Ok((cpu, memory)) => Some(ContainerTarget {
                        container: container_ref,
                        cpu,
                        memory,
                    }),
                    Err(e) => {
                        warn!(container = %container_ref, error = %e, "Unparseable resources, skipping");
                        None
                    }
                }
            })
            .collect()
    }
}

fn is_system_pod(pod: &Pod) -> bool {
    let Some(labels) = pod.metadata.labels.as_ref() else {
        return false;
    };
    SYSTEM_POD_LABELS.iter().any(|(key, values)| {
        labels
            .get(*key)
            .is_some_and(|value| values.contains(&value.as_str()))
    })
}

/// CPU (millicores) and memory (bytes) request/limit pairs of a container
pub fn container_resources(
    resources: Option<&ResourceRequirements>,
) -> Result<(ResourceSpec, ResourceSpec)> {
    let Some(resources) = resources else {
        return Ok((ResourceSpec::default(), ResourceSpec::default()));
    };

    let cpu = ResourceSpec::new(
        lookup(resources.requests.as_ref(), "cpu", parse_cpu_millicores)?,
        lookup(resources.limits.as_ref(), "cpu", parse_cpu_millicores)?,
    );
    let memory = ResourceSpec::new(
        lookup(resources.requests.as_ref(), "memory", parse_memory_bytes)?,
        lookup(resources.limits.as_ref(), "memory", parse_memory_bytes)?,
    );
    Ok((cpu, memory))
}

fn lookup(
    list: Option<&BTreeMap<String, Quantity>>,
    key: &str,
    parse: fn(&str) -> Result<u64, QuantityError>,
) -> Result<u64> {
    match list.and_then(|l| l.get(key)) {
        Some(quantity) => parse(&quantity.0).with_context(|| format!("invalid {} quantity", key)),
        None => Ok(0),
    }
}
