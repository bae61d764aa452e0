//! Right-sizer library for in-place container resource resizing
//!
//! This crate provides the core functionality for:
//! - Threshold-based scaling decisions with cooldown
//! - Resize plan building
//! - Batched in-place resize execution against the cluster
//! - The periodic reconciliation loop
//! - Health checks and observability

#[macro_use]
extern crate uom;

pub mod engine;
pub mod error;
pub mod executor;
pub mod health;
pub mod models;
pub mod observability;
pub mod planner;
pub mod policy;
pub mod provider;
pub mod quantity;
pub mod reconciler;
pub mod runtime;

pub use engine::DecisionEngine;
pub use error::{ConfigError, CycleError, QuantityError, RuntimeError};
pub use executor::{BatchExecutor, ExecutionSummary};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{RightsizerMetrics, StructuredLogger};
pub use policy::{Bounds, ExecutorConfig, NamespaceFilter, Policy};
pub use reconciler::{LogReporter, Reconciler, ReconcilerBuilder, ResultReporter};
