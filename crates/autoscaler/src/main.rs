//! LLM Autoscaler - closed-loop replica controller
//!
//! Runs as a Deployment next to its target, polling CPU usage and asking a
//! generative model whether to scale, restart or leave the workload alone.

use anyhow::{Context, Result};
use autoscaler_lib::{
    health::HealthRegistry,
    metrics::PrometheusClient,
    observability::StructuredLogger,
    oracle::LlmOracle,
    orchestrator::KubeOrchestrator,
    AutoscalerConfig, ControlLoop, ControllerBuilder,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;

const AUTOSCALER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting llm-autoscaler");

    let config = AutoscalerConfig::load()?;
    let target = config.target();
    let bounds = config.bounds()?;
    info!(
        workload = %target,
        min_replicas = bounds.min(),
        max_replicas = bounds.max(),
        "Autoscaler configured"
    );
    if config.oracle_url.is_none() || config.oracle_api_key.is_none() {
        warn!("Oracle endpoint or API key not set; every tick will skip actuation");
    }

    // The only startup failure allowed to stop the process
    let orchestrator = KubeOrchestrator::connect(bounds, config.restart_annotation.clone())
        .await
        .context("Cannot establish Kubernetes session")?;

    let metrics = PrometheusClient::new(&config.prometheus_url, config.metrics_timeout())?;
    let oracle = LlmOracle::new(config.oracle_config(), bounds)?;

    let controller = ControllerBuilder::new()
        .metrics(Arc::new(metrics))
        .orchestrator(Arc::new(orchestrator))
        .oracle(Arc::new(oracle))
        .target(target.clone())
        .bounds(bounds)
        .cooldown(config.cooldown())
        .rate_window(config.cpu_rate_window.clone())
        .build()?;

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;
    health_registry
        .set_stale_after(chrono::Duration::from_std(config.poll_interval() * 3)?)
        .await;

    let logger = StructuredLogger::new(target.to_string());
    logger.log_startup(
        AUTOSCALER_VERSION,
        config.poll_interval_secs,
        config.cooldown_secs,
    );

    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let control_loop = ControlLoop::new(controller, config.poll_interval(), health_registry.clone());
    let loop_handle = tokio::spawn(control_loop.run(shutdown_rx));

    health_registry.set_ready(true).await;

    let reason = shutdown_signal().await?;
    logger.log_shutdown(reason);

    // The loop finishes its in-flight tick before returning
    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        error!(error = %e, "Control loop task failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or, on Unix, SIGTERM
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT received").map_err(Into::into),
            _ = sigterm.recv() => Ok("SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT received")
    }
}
