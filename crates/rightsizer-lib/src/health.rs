//! Component health tracking for liveness and readiness probes
//!
//! The reconciler reports every cycle here. A failed cycle degrades it;
//! enough consecutive failures make it unhealthy, which fails readiness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive failed cycles before the reconciler is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operational, but the last operation did not go cleanly
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Tracked right-sizer components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Provider,
    Executor,
    Reconciler,
}

impl Component {
    pub const ALL: [Component; 3] = [
        Component::Provider,
        Component::Executor,
        Component::Reconciler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Provider => "provider",
            Component::Executor => "executor",
            Component::Reconciler => "reconciler",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check: Utc::now(),
        }
    }
}

/// Reconciliation progress shown alongside component health
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleHealth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub cycles: CycleHealth,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct HealthState {
    components: HashMap<Component, ComponentHealth>,
    cycles: CycleHealth,
}

/// Shared health registry; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
    ready: Arc<AtomicBool>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every component as healthy
    pub async fn register_all(&self) {
        let mut state = self.state.write().await;
        for component in Component::ALL {
            state.components.insert(component, ComponentHealth::healthy());
        }
    }

    pub async fn update(&self, component: Component, health: ComponentHealth) {
        self.state.write().await.components.insert(component, health);
    }

    pub async fn set_healthy(&self, component: Component) {
        self.update(component, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.update(component, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.update(component, ComponentHealth::unhealthy(message)).await;
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// A cycle finished; resets the failure streak
    pub async fn record_cycle_success(&self, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.cycles.last_success = Some(at);
        state.cycles.consecutive_failures = 0;
        state
            .components
            .insert(Component::Reconciler, ComponentHealth::healthy());
    }

    /// A cycle failed as a whole
    pub async fn record_cycle_failure(&self, at: DateTime<Utc>, message: impl Into<String>) {
        let mut state = self.state.write().await;
        state.cycles.last_failure = Some(at);
        state.cycles.consecutive_failures += 1;

        let health = if state.cycles.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            ComponentHealth::unhealthy(message)
        } else {
            ComponentHealth::degraded(message)
        };
        state.components.insert(Component::Reconciler, health);
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let components: HashMap<String, ComponentHealth> = state
            .components
            .iter()
            .map(|(component, health)| (component.to_string(), health.clone()))
            .collect();
        let status = HealthResponse::compute_status(&components);

        HealthResponse {
            status,
            components,
            cycles: state.cycles.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if !self.ready.load(Ordering::SeqCst) {
            return ReadinessResponse {
                ready: false,
                reason: Some("Reconciler not yet scheduled".to_string()),
            };
        }

        if self.health().await.status == ComponentStatus::Unhealthy {
            return ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            };
        }

        ReadinessResponse {
            ready: true,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert_eq!(health.cycles.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_register_all() {
        let registry = HealthRegistry::new();
        registry.register_all().await;

        let health = registry.health().await;
        assert_eq!(health.components.len(), 3);
        assert_eq!(
            health.components["executor"].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_degraded_component() {
        let registry = HealthRegistry::new();
        registry.register_all().await;
        registry
            .set_degraded(Component::Provider, "Metrics API slow")
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_cycle_failures_escalate() {
        let registry = HealthRegistry::new();
        registry.register_all().await;
        registry.set_ready(true);

        let now = Utc::now();
        registry.record_cycle_failure(now, "no samples").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);

        for _ in 1..UNHEALTHY_AFTER_FAILURES {
            registry.record_cycle_failure(now, "no samples").await;
        }
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(health.cycles.consecutive_failures, UNHEALTHY_AFTER_FAILURES);
        assert!(!registry.readiness().await.ready);

        registry.record_cycle_success(now).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.cycles.consecutive_failures, 0);
        assert_eq!(health.cycles.last_success, Some(now));
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register_all().await;
        registry.set_ready(true);
        registry.set_unhealthy(Component::Executor, "Failed").await;

        assert!(!registry.readiness().await.ready);
    }
}
