//! Health tracking for liveness and readiness probes
//!
//! Collaborator health is derived from tick results. Liveness also checks
//! that the control loop keeps completing ticks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Failing but the controller keeps running
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<DateTime<Utc>>,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .fold(ComponentStatus::Healthy, |worst, s| match (worst, s) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const METRICS: &str = "metrics";
    pub const ORACLE: &str = "oracle";
    pub const ORCHESTRATOR: &str = "orchestrator";
    pub const CONTROLLER: &str = "controller";
}

#[derive(Debug)]
struct LoopState {
    ready: bool,
    /// First time the loop was marked ready; staleness baseline before any tick
    ready_since: Option<DateTime<Utc>>,
    last_tick: Option<DateTime<Utc>>,
    /// Liveness fails when no tick completed within this window
    stale_after: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    state: Arc<RwLock<LoopState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            state: Arc::new(RwLock::new(LoopState {
                ready: false,
                ready_since: None,
                last_tick: None,
                stale_after: None,
            })),
        }
    }

    /// Register every controller component as healthy
    pub async fn register_all(&self) {
        for name in [
            components::METRICS,
            components::ORACLE,
            components::ORCHESTRATOR,
            components::CONTROLLER,
        ] {
            self.register(name).await;
        }
    }

    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.set_ready_at(ready, Utc::now()).await;
    }

    pub async fn set_ready_at(&self, ready: bool, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.ready = ready;
        if ready && state.ready_since.is_none() {
            state.ready_since = Some(now);
        }
    }

    /// Mark the loop stale when no tick completes within `window`
    pub async fn set_stale_after(&self, window: Duration) {
        self.state.write().await.stale_after = Some(window);
    }

    pub async fn record_tick(&self, at: DateTime<Utc>) {
        self.state.write().await.last_tick = Some(at);
    }

    pub async fn health(&self) -> HealthResponse {
        self.health_at(Utc::now()).await
    }

    pub async fn health_at(&self, now: DateTime<Utc>) -> HealthResponse {
        let mut components = self.components.read().await.clone();
        let state = self.state.read().await;

        let baseline = state.last_tick.or(state.ready_since);
        if let (Some(since), Some(window)) = (baseline, state.stale_after) {
            if now - since > window {
                let message = if state.last_tick.is_some() {
                    format!("no tick completed in {}s", (now - since).num_seconds())
                } else {
                    format!("first tick not completed after {}s", (now - since).num_seconds())
                };
                components.insert(
                    components::CONTROLLER.to_string(),
                    ComponentHealth::unhealthy(message),
                );
            }
        }

        let status = HealthResponse::compute_status(&components);
        HealthResponse {
            status,
            components,
            last_tick: state.last_tick,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = self.state.read().await.ready;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Autoscaler not yet initialized".to_string()),
            }
        } else if !health.status.is_operational() {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}
