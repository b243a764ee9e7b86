//! Library for an LLM-driven replica autoscaler
//!
//! This crate provides:
//! - CPU readings from a Prometheus query API
//! - Kubernetes Deployment reads and partial patches
//! - A decision oracle backed by a generative language model
//! - The cooldown-guarded controller and its control loop
//! - Configuration, health checks and observability

pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod oracle;
pub mod orchestrator;

pub use config::AutoscalerConfig;
pub use controller::{Controller, ControllerBuilder, ControlLoop, TickOutcome, TickReport};
pub use error::{MetricsError, OracleError, OrchestrationError, TickError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ControllerMetrics, StructuredLogger};
