//! Orchestration API access
//!
//! Reads the workload's replica counts and applies partial updates. Writes
//! are always JSON patches touching a single field so concurrent edits to
//! the rest of the Deployment survive.

mod kubernetes;
mod patch;

pub use kubernetes::{replicas_from_deployment, KubeOrchestrator};
pub use patch::{escape_pointer_token, replicas_patch, restart_patch, REPLICAS_PATH};

use crate::error::OrchestrationError;
use crate::models::{WorkloadReplicas, WorkloadTarget};
use async_trait::async_trait;

/// Read/write access to the managed workload
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Read desired and observed replica counts
    async fn get_replicas(
        &self,
        target: &WorkloadTarget,
    ) -> Result<WorkloadReplicas, OrchestrationError>;

    /// Set the replica count, clamped into the configured bounds first.
    /// Returns the value actually written.
    async fn patch_replicas(
        &self,
        target: &WorkloadTarget,
        replicas: i64,
    ) -> Result<u32, OrchestrationError>;

    /// Trigger a rollout by stamping the pod template with `timestamp`
    async fn patch_restart(
        &self,
        target: &WorkloadTarget,
        timestamp: &str,
    ) -> Result<(), OrchestrationError>;
}
