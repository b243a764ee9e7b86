//! Core data models for the autoscaler

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// The workload whose replica count is managed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadTarget {
    pub namespace: String,
    pub name: String,
}

impl WorkloadTarget {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Inclusive replica bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    min: u32,
    max: u32,
}

impl Bounds {
    /// Create bounds, rejecting `min == 0` and `max < min`
    pub fn new(min: u32, max: u32) -> Result<Self, ConfigError> {
        if min < 1 {
            return Err(ConfigError::InvalidBounds {
                min,
                max,
                reason: "min replicas must be at least 1",
            });
        }
        if max < min {
            return Err(ConfigError::InvalidBounds {
                min,
                max,
                reason: "max replicas must not be below min replicas",
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Force a requested replica count into `[min, max]`
    pub fn clamp(&self, requested: i64) -> u32 {
        requested.clamp(self.min as i64, self.max as i64) as u32
    }

    pub fn contains(&self, replicas: u32) -> bool {
        (self.min..=self.max).contains(&replicas)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

/// Replica counts read from the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkloadReplicas {
    /// Desired count from `spec.replicas`
    pub desired: u32,
    /// `status.replicas`, when reported
    pub current: Option<u32>,
    /// `status.availableReplicas`, when reported
    pub available: Option<u32>,
}

/// Per-tick snapshot handed to the decision oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub time: DateTime<Utc>,
    pub deployment: String,
    pub namespace: String,
    pub current_replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_replicas: Option<u32>,
    /// CPU usage in cores
    pub cpu: f64,
    /// Set when `cpu` is a fallback because the metrics backend gave no value
    pub metrics_degraded: bool,
}

impl Context {
    pub fn new(
        time: DateTime<Utc>,
        target: &WorkloadTarget,
        replicas: WorkloadReplicas,
        cpu: Option<f64>,
    ) -> Self {
        Self {
            time,
            deployment: target.name.clone(),
            namespace: target.namespace.clone(),
            current_replicas: replicas.desired,
            available_replicas: replicas.available,
            cpu: cpu.unwrap_or(0.0),
            metrics_degraded: cpu.is_none(),
        }
    }
}

/// Action requested by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Scale,
    Noop,
    Restart,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Scale => "scale",
            Action::Noop => "noop",
            Action::Restart => "restart",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scale" => Some(Action::Scale),
            "noop" => Some(Action::Noop),
            "restart" => Some(Action::Restart),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated oracle decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub replicas: Option<i64>,
    pub reason: String,
    pub confidence: f64,
}

impl Decision {
    /// Decision used when the oracle reply is not parseable JSON
    pub fn bad_json() -> Self {
        Self::noop("bad-json")
    }

    /// A zero-confidence noop carrying a diagnostic reason
    pub fn noop(reason: impl Into<String>) -> Self {
        Self {
            action: Action::Noop,
            replicas: None,
            reason: reason.into(),
            confidence: 0.0,
        }
    }

    /// Downgrade semantically invalid decisions and bound the confidence
    pub fn validated(self) -> Self {
        if self.action == Action::Scale && self.replicas.is_none() {
            return Self::noop("invalid-replicas");
        }
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let replicas = match self.action {
            Action::Scale => self.replicas,
            Action::Noop | Action::Restart => None,
        };
        Self {
            replicas,
            confidence,
            ..self
        }
    }
}

/// Time of the last successful actuation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    last_action: Option<DateTime<Utc>>,
}

impl CooldownState {
    /// State for a process that has never actuated
    pub fn never() -> Self {
        Self { last_action: None }
    }

    pub fn last_action(&self) -> Option<DateTime<Utc>> {
        self.last_action
    }

    /// Time left before actuation is allowed again, if any
    pub fn remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Option<Duration> {
        let last = self.last_action?;
        let elapsed = now - last;
        if elapsed < cooldown {
            Some(cooldown - elapsed)
        } else {
            None
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.remaining(now, cooldown).is_some()
    }

    pub fn record_action(&mut self, at: DateTime<Utc>) {
        self.last_action = Some(at);
    }
}
