//! Right-sizer - in-place container resource right-sizing operator
//!
//! Periodically samples container usage from the metrics API and resizes
//! CPU and memory of running pods through the `pods/resize` subresource.

use anyhow::{Context, Result};
use rightsizer::{api, config::OperatorConfig};
use rightsizer_lib::{
    provider::{MetricsServerProvider, SelfIdentity, TargetSelector},
    runtime::KubeResizeRuntime,
    HealthRegistry, LogReporter, ReconcilerBuilder, RightsizerMetrics, StructuredLogger,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting right-sizer");

    let config = OperatorConfig::load()?;
    info!(
        api_port = config.api_port,
        interval_secs = config.resize_interval_secs,
        batch_size = config.executor.batch_size,
        concurrency = config.executor.concurrency,
        dry_run = config.executor.dry_run,
        "Right-sizer configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    // Register collectors so /metrics is complete before the first cycle
    RightsizerMetrics::new();

    let logger = StructuredLogger::new(&config.operator_name);
    logger.log_startup(
        OPERATOR_VERSION,
        config.executor.dry_run,
        config.resize_interval(),
    );

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let selector = TargetSelector::new(
        config.namespaces.clone(),
        SelfIdentity::from_env(&config.operator_name),
    );
    let provider = Arc::new(MetricsServerProvider::new(client.clone(), selector));
    let runtime = Arc::new(KubeResizeRuntime::new(client));

    let reconciler = ReconcilerBuilder::new()
        .provider(provider)
        .runtime(runtime)
        .reporter(Arc::new(LogReporter::new(logger.clone())))
        .health(health_registry.clone())
        .policy(config.policy.clone())
        .executor(config.executor.clone())
        .interval(config.resize_interval())
        .build()?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // The reconciler finishes its in-flight cycle before stopping
    let _ = shutdown_tx.send(());
    if let Err(e) = reconciler_handle.await {
        warn!(error = %e, "Reconciler task ended abnormally");
    }
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
