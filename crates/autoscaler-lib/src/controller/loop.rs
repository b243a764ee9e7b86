//! Timer-driven control loop
//!
//! Runs one controller tick per poll interval until a shutdown signal
//! arrives. The signal is only observed between ticks, so a tick that has
//! started always runs to completion.

use super::{Controller, TickOutcome, TickReport};
use crate::error::TickError;
use crate::health::{components, HealthRegistry};
use crate::observability::{ControllerMetrics, StructuredLogger};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

pub struct ControlLoop {
    controller: Controller,
    poll_interval: Duration,
    health: HealthRegistry,
    metrics: ControllerMetrics,
    logger: StructuredLogger,
}

impl ControlLoop {
    pub fn new(controller: Controller, poll_interval: Duration, health: HealthRegistry) -> Self {
        let logger = StructuredLogger::new(controller.target().to_string());
        Self {
            controller,
            poll_interval,
            health,
            metrics: ControllerMetrics::new(),
            logger,
        }
    }

    /// Tick immediately, then once per poll interval, until `shutdown` fires
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Controller {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Starting control loop"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutting down control loop");
                    break;
                }
                _ = ticker.tick() => {
                    // Errors are already logged and counted
                    let _ = self.run_once().await;
                }
            }
        }

        self.controller
    }

    /// Run a single tick and record its result; never panics on tick failure
    pub async fn run_once(&mut self) -> Result<TickReport, TickError> {
        let now = Utc::now();
        let result = self.controller.tick_at(now).await;

        match &result {
            Ok(report) => {
                self.metrics.inc_tick(report.outcome.label());
                self.record_success(report).await;
            }
            Err(e) => {
                self.logger.log_tick_error(e.kind(), e);
                self.metrics.inc_tick_error(e.kind());
                self.metrics.inc_tick("failed");
                self.record_failure(e).await;
            }
        }

        self.health.record_tick(now).await;
        result
    }

    async fn record_success(&self, report: &TickReport) {
        self.health.set_healthy(components::ORCHESTRATOR).await;
        self.health.set_healthy(components::CONTROLLER).await;

        if report.context.metrics_degraded {
            self.health
                .set_degraded(components::METRICS, "CPU usage unavailable")
                .await;
        } else {
            self.health.set_healthy(components::METRICS).await;
        }

        if !matches!(report.outcome, TickOutcome::CooldownActive { .. }) {
            self.health.set_healthy(components::ORACLE).await;
        }
    }

    async fn record_failure(&self, error: &TickError) {
        let component = match error {
            TickError::OrchestrationRead(_) | TickError::OrchestrationWrite(_) => {
                components::ORCHESTRATOR
            }
            TickError::OracleUnavailable(_) => components::ORACLE,
        };
        self.health.set_degraded(component, error.to_string()).await;
    }
}
