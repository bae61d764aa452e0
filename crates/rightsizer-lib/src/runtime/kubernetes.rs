//! In-place resize through the Kubernetes `pods/resize` subresource

use super::{ResizeRequest, ResizeRuntime};
use crate::error::RuntimeError;
use crate::models::ResourceDimension;
use crate::quantity::{format_cpu, format_memory};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Subresource that accepts resource changes on running pods
const RESIZE_SUBRESOURCE: &str = "resize";

/// Message fragments the API server uses when refusing an in-place decrease
const DECREASE_REJECTION_MARKERS: &[&str] = &["cannot be decreased", "decrease not permitted"];

/// Resize runtime backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeResizeRuntime {
    client: Client,
}

impl KubeResizeRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResizeRuntime for KubeResizeRuntime {
    async fn apply(&self, request: &ResizeRequest) -> Result<(), RuntimeError> {
        let pod = &request.container.pod;
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let body = resize_patch_body(request);

        debug!(container = %request.container, patch = %body, "Patching pod resize subresource");

        match pods
            .patch_subresource(
                RESIZE_SUBRESOURCE,
                &pod.name,
                &PatchParams::default(),
                &Patch::Strategic(&body),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) => {
                let err = classify_api_error(response.code, &response.message, request);
                if let RuntimeError::Failed(_) = &err {
                    warn!(
                        container = %request.container,
                        code = response.code,
                        reason = %response.reason,
                        "Resize rejected without a recognizable dimension, treating as failure"
                    );
                }
                Err(err)
            }
            Err(e) => Err(RuntimeError::Failed(e.to_string())),
        }
    }
}

/// Strategic-merge body for the resize subresource
fn resize_patch_body(request: &ResizeRequest) -> Value {
    let mut requests = Map::new();
    let mut limits = Map::new();

    for patch in &request.patches {
        let format = |value: u64| match patch.dimension {
            ResourceDimension::Cpu => format_cpu(value),
            ResourceDimension::Memory => format_memory(value),
        };
        if let Some(value) = patch.request {
            requests.insert(patch.dimension.as_str().to_string(), json!(format(value)));
        }
        if let Some(value) = patch.limit {
            limits.insert(patch.dimension.as_str().to_string(), json!(format(value)));
        }
    }

    let mut resources = Map::new();
    if !requests.is_empty() {
        resources.insert("requests".to_string(), Value::Object(requests));
    }
    if !limits.is_empty() {
        resources.insert("limits".to_string(), Value::Object(limits));
    }

    json!({
        "spec": {
            "containers": [{
                "name": request.container.container,
                "resources": resources,
            }]
        }
    })
}

/// Map an API error response onto the runtime's three outcomes.
///
/// A 403/422 carrying a decrease-rejection message structurally rejects the
/// decreasing dimensions it names, or all decreasing dimensions when it names
/// none. Anything else cannot be told apart from a transient failure.
pub fn classify_api_error(code: u16, message: &str, request: &ResizeRequest) -> RuntimeError {
    let lower = message.to_lowercase();
    let decreasing = request.decreasing_dimensions();

    let is_decrease_rejection = matches!(code, 403 | 422)
        && DECREASE_REJECTION_MARKERS.iter().any(|m| lower.contains(m));

    if !is_decrease_rejection || decreasing.is_empty() {
        return RuntimeError::Failed(format!("{} ({})", message, code));
    }

    let named: Vec<ResourceDimension> = decreasing
        .iter()
        .copied()
        .filter(|d| lower.contains(d.as_str()))
        .collect();

    RuntimeError::Rejected {
        dimensions: if named.is_empty() { decreasing } else { named },
        reason: message.to_string(),
    }
}
