//! Observability infrastructure for the autoscaler
//!
//! Provides:
//! - Prometheus metrics (tick outcomes, decisions, actuations, oracle latency)
//! - Structured JSON logging with tracing

use crate::models::{Context, Decision};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Oracle calls are slow; buckets span up to the default request timeout
const ORACLE_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ControllerMetricsInner> = OnceLock::new();

struct ControllerMetricsInner {
    ticks: IntCounterVec,
    decisions: IntCounterVec,
    actuations: IntCounterVec,
    tick_errors: IntCounterVec,
    metrics_degraded: IntCounter,
    oracle_latency_seconds: Histogram,
    current_replicas: IntGauge,
    cpu_usage_cores: Gauge,
}

impl ControllerMetricsInner {
    fn new() -> Self {
        Self {
            ticks: register_int_counter_vec!(
                "autoscaler_ticks_total",
                "Controller ticks by outcome",
                &["outcome"]
            )
            .expect("Failed to register ticks"),

            decisions: register_int_counter_vec!(
                "autoscaler_decisions_total",
                "Validated oracle decisions by action",
                &["action"]
            )
            .expect("Failed to register decisions"),

            actuations: register_int_counter_vec!(
                "autoscaler_actuations_total",
                "Successful writes to the workload by kind",
                &["kind"]
            )
            .expect("Failed to register actuations"),

            tick_errors: register_int_counter_vec!(
                "autoscaler_tick_errors_total",
                "Ticks that ended with an error, by error kind",
                &["kind"]
            )
            .expect("Failed to register tick_errors"),

            metrics_degraded: register_int_counter!(
                "autoscaler_metrics_degraded_total",
                "Ticks where CPU usage was unavailable and defaulted to zero"
            )
            .expect("Failed to register metrics_degraded"),

            oracle_latency_seconds: register_histogram!(
                "autoscaler_oracle_latency_seconds",
                "Time spent waiting for the decision oracle",
                ORACLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register oracle_latency_seconds"),

            current_replicas: register_int_gauge!(
                "autoscaler_current_replicas",
                "Desired replica count observed at the last tick"
            )
            .expect("Failed to register current_replicas"),

            cpu_usage_cores: register_gauge!(
                "autoscaler_cpu_usage_cores",
                "Workload CPU usage observed at the last tick"
            )
            .expect("Failed to register cpu_usage_cores"),
        }
    }
}

/// Controller metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct ControllerMetrics {
    _private: (),
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControllerMetricsInner {
        GLOBAL_METRICS.get_or_init(ControllerMetricsInner::new)
    }

    pub fn inc_tick(&self, outcome: &str) {
        self.inner().ticks.with_label_values(&[outcome]).inc();
    }

    pub fn inc_decision(&self, action: &str) {
        self.inner().decisions.with_label_values(&[action]).inc();
    }

    pub fn inc_actuation(&self, kind: &str) {
        self.inner().actuations.with_label_values(&[kind]).inc();
    }

    pub fn inc_tick_error(&self, kind: &str) {
        self.inner().tick_errors.with_label_values(&[kind]).inc();
    }

    pub fn observe_oracle_latency(&self, duration_secs: f64) {
        self.inner().oracle_latency_seconds.observe(duration_secs);
    }

    /// Record the gathered context
    pub fn observe_context(&self, context: &Context) {
        self.inner().current_replicas.set(context.current_replicas as i64);
        self.inner().cpu_usage_cores.set(context.cpu);
        if context.metrics_degraded {
            self.inner().metrics_degraded.inc();
        }
    }
}

/// Structured logger for controller events
#[derive(Clone)]
pub struct StructuredLogger {
    workload: String,
}

impl StructuredLogger {
    pub fn new(workload: impl Into<String>) -> Self {
        Self {
            workload: workload.into(),
        }
    }

    pub fn log_startup(&self, version: &str, poll_interval_secs: u64, cooldown_secs: u64) {
        info!(
            event = "autoscaler_started",
            workload = %self.workload,
            version = %version,
            poll_interval_secs,
            cooldown_secs,
            "Autoscaler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "autoscaler_shutdown",
            workload = %self.workload,
            reason = %reason,
            "Autoscaler shutting down"
        );
    }

    pub fn log_context(&self, context: &Context) {
        if context.metrics_degraded {
            warn!(
                event = "context_gathered",
                workload = %self.workload,
                current_replicas = context.current_replicas,
                available_replicas = ?context.available_replicas,
                cpu = context.cpu,
                metrics_degraded = true,
                "CPU metrics unavailable, using 0"
            );
        } else {
            info!(
                event = "context_gathered",
                workload = %self.workload,
                current_replicas = context.current_replicas,
                available_replicas = ?context.available_replicas,
                cpu = context.cpu,
                metrics_degraded = false,
                "Context gathered"
            );
        }
    }

    pub fn log_cooldown(&self, remaining_secs: i64) {
        info!(
            event = "cooldown_active",
            workload = %self.workload,
            remaining_secs,
            "Cooldown active; skipping"
        );
    }

    pub fn log_decision(&self, decision: &Decision) {
        info!(
            event = "decision",
            workload = %self.workload,
            action = %decision.action,
            replicas = ?decision.replicas,
            reason = %decision.reason,
            confidence = decision.confidence,
            "Oracle decision"
        );
    }

    pub fn log_scaled(&self, from: u32, to: u32, decision: &Decision) {
        info!(
            event = "scaled",
            workload = %self.workload,
            from_replicas = from,
            to_replicas = to,
            requested_replicas = ?decision.replicas,
            reason = %decision.reason,
            "Scale action executed"
        );
    }

    pub fn log_restarted(&self, timestamp: &str, decision: &Decision) {
        info!(
            event = "restarted",
            workload = %self.workload,
            timestamp = %timestamp,
            reason = %decision.reason,
            "Restart action executed"
        );
    }

    pub fn log_tick_error(&self, kind: &str, error: &dyn std::error::Error) {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        warn!(
            event = "tick_failed",
            workload = %self.workload,
            kind = %kind,
            error = %error,
            causes = ?causes,
            "Tick failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorkloadReplicas, WorkloadTarget};
    use chrono::Utc;

    #[test]
    fn test_controller_metrics_recording() {
        let metrics = ControllerMetrics::new();
        let ctx = Context::new(
            Utc::now(),
            &WorkloadTarget::new("default", "app"),
            WorkloadReplicas::default(),
            None,
        );

        metrics.observe_context(&ctx);
        metrics.inc_tick("scaled");
        metrics.inc_decision("scale");
        metrics.inc_actuation("scale");
        metrics.inc_tick_error("oracle_unavailable");
        metrics.observe_oracle_latency(1.5);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "autoscaler_ticks_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("default/app");
        assert_eq!(logger.workload, "default/app");
    }
}
