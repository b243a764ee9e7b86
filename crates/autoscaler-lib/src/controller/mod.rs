//! Closed-loop replica controller
//!
//! One tick gathers a [`Context`], checks the cooldown, consults the
//! decision oracle, clamps the decision into bounds and actuates it.
//! [`ControlLoop`] drives ticks on a timer and isolates their failures.

mod r#loop;


pub use r#loop::ControlLoop;

use crate::error::TickError;
use crate::metrics::{cpu_query, MetricsSource};
use crate::models::{Action, Bounds, Context, CooldownState, Decision, WorkloadTarget};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::oracle::DecisionOracle;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tokio::time::Instant;

/// What a completed tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Skipped before consulting the oracle
    CooldownActive { remaining: Duration },
    Noop { decision: Decision },
    Scaled {
        from: u32,
        to: u32,
        decision: Decision,
    },
    Restarted {
        timestamp: String,
        decision: Decision,
    },
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::CooldownActive { .. } => "cooldown",
            TickOutcome::Noop { .. } => "noop",
            TickOutcome::Scaled { .. } => "scaled",
            TickOutcome::Restarted { .. } => "restarted",
        }
    }

    pub fn is_actuation(&self) -> bool {
        matches!(
            self,
            TickOutcome::Scaled { .. } | TickOutcome::Restarted { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub context: Context,
    pub outcome: TickOutcome,
}

/// A decision computed without actuating it
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPreview {
    pub context: Context,
    pub decision: Decision,
    /// Replica count that would be written for a scale decision
    pub planned_replicas: Option<u32>,
}

/// Single-target controller; owns the cooldown state
pub struct Controller {
    metrics: Arc<dyn MetricsSource>,
    orchestrator: Arc<dyn Orchestrator>,
    oracle: Arc<dyn DecisionOracle>,
    target: WorkloadTarget,
    bounds: Bounds,
    cooldown: Duration,
    cpu_query: String,
    cooldown_state: CooldownState,
    telemetry: ControllerMetrics,
    logger: StructuredLogger,
}

impl Controller {
    pub fn target(&self) -> &WorkloadTarget {
        &self.target
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn cooldown_state(&self) -> CooldownState {
        self.cooldown_state
    }

    /// Replace the cooldown state, e.g. to resume after a known actuation
    pub fn set_cooldown_state(&mut self, state: CooldownState) {
        self.cooldown_state = state;
    }

    /// Read replicas and CPU into a context for `now`
    pub async fn gather_context(&self, now: DateTime<Utc>) -> Result<Context, TickError> {
        let replicas = self
            .orchestrator
            .get_replicas(&self.target)
            .await
            .map_err(TickError::OrchestrationRead)?;
        let cpu = self.metrics.query(&self.cpu_query).await;

        Ok(Context::new(now, &self.target, replicas, cpu))
    }

    /// Gather context and ask the oracle, ignoring cooldown and never writing
    pub async fn preview(&self, now: DateTime<Utc>) -> Result<DecisionPreview, TickError> {
        let context = self.gather_context(now).await?;
        let decision = self.consult(&context).await?;
        let planned_replicas = match decision.action {
            Action::Scale => decision.replicas.map(|n| self.bounds.clamp(n)),
            Action::Noop | Action::Restart => None,
        };

        Ok(DecisionPreview {
            context,
            decision,
            planned_replicas,
        })
    }

    pub async fn tick(&mut self) -> Result<TickReport, TickError> {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick as if the current time were `now`
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TickReport, TickError> {
        let context = self.gather_context(now).await?;
        self.logger.log_context(&context);
        self.telemetry.observe_context(&context);

        if let Some(remaining) = self.cooldown_state.remaining(now, self.cooldown) {
            self.logger.log_cooldown(remaining.num_seconds());
            return Ok(TickReport {
                context,
                outcome: TickOutcome::CooldownActive { remaining },
            });
        }

        let decision = self.consult(&context).await?;
        self.logger.log_decision(&decision);
        self.telemetry.inc_decision(decision.action.as_str());

        let outcome = self.actuate(now, &context, decision).await?;
        Ok(TickReport { context, outcome })
    }

    async fn consult(&self, context: &Context) -> Result<Decision, TickError> {
        let started = Instant::now();
        let result = self.oracle.decide(context).await;
        self.telemetry
            .observe_oracle_latency(started.elapsed().as_secs_f64());

        // The oracle is not trusted to have validated its own output
        Ok(result?.validated())
    }

    async fn actuate(
        &mut self,
        now: DateTime<Utc>,
        context: &Context,
        decision: Decision,
    ) -> Result<TickOutcome, TickError> {
        match (decision.action, decision.replicas) {
            (Action::Scale, Some(requested)) => {
                let clamped = self.bounds.clamp(requested);
                let written = self
                    .orchestrator
                    .patch_replicas(&self.target, clamped as i64)
                    .await
                    .map_err(TickError::from_actuation)?;
                self.cooldown_state.record_action(now);
                self.telemetry.inc_actuation("scale");
                self.logger
                    .log_scaled(context.current_replicas, written, &decision);

                Ok(TickOutcome::Scaled {
                    from: context.current_replicas,
                    to: written,
                    decision,
                })
            }
            (Action::Restart, _) => {
                let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
                self.orchestrator
                    .patch_restart(&self.target, &timestamp)
                    .await
                    .map_err(TickError::from_actuation)?;
                self.cooldown_state.record_action(now);
                self.telemetry.inc_actuation("restart");
                self.logger.log_restarted(&timestamp, &decision);

                Ok(TickOutcome::Restarted {
                    timestamp,
                    decision,
                })
            }
            (Action::Scale, None) => Ok(TickOutcome::Noop {
                decision: Decision::noop("invalid-replicas"),
            }),
            (Action::Noop, _) => Ok(TickOutcome::Noop { decision }),
        }
    }
}

/// Builder for [`Controller`]
pub struct ControllerBuilder {
    metrics: Option<Arc<dyn MetricsSource>>,
    orchestrator: Option<Arc<dyn Orchestrator>>,
    oracle: Option<Arc<dyn DecisionOracle>>,
    target: Option<WorkloadTarget>,
    bounds: Bounds,
    cooldown: std::time::Duration,
    rate_window: String,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            metrics: None,
            orchestrator: None,
            oracle: None,
            target: None,
            bounds: Bounds::default(),
            cooldown: std::time::Duration::from_secs(120),
            rate_window: "1m".to_string(),
        }
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn orchestrator(mut self, orchestrator: Arc<dyn Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn DecisionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn target(mut self, target: WorkloadTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn cooldown(mut self, cooldown: std::time::Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Range vector window for the CPU rate query
    pub fn rate_window(mut self, window: impl Into<String>) -> Self {
        self.rate_window = window.into();
        self
    }

    pub fn build(self) -> Result<Controller> {
        let metrics = self
            .metrics
            .ok_or_else(|| anyhow::anyhow!("Metrics source is required"))?;
        let orchestrator = self
            .orchestrator
            .ok_or_else(|| anyhow::anyhow!("Orchestrator is required"))?;
        let oracle = self
            .oracle
            .ok_or_else(|| anyhow::anyhow!("Decision oracle is required"))?;
        let target = self
            .target
            .ok_or_else(|| anyhow::anyhow!("Target workload is required"))?;
        let cooldown = Duration::from_std(self.cooldown)?;

        Ok(Controller {
            metrics,
            orchestrator,
            oracle,
            cpu_query: cpu_query(&target, &self.rate_window),
            logger: StructuredLogger::new(target.to_string()),
            target,
            bounds: self.bounds,
            cooldown,
            cooldown_state: CooldownState::never(),
            telemetry: ControllerMetrics::new(),
        })
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
