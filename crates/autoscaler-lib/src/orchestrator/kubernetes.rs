//! Kubernetes Deployment access through `kube`

use super::patch::{replicas_patch, restart_patch};
use super::Orchestrator;
use crate::error::OrchestrationError;
use crate::models::{Bounds, WorkloadReplicas, WorkloadTarget};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::{debug, info};

/// Extract replica counts, treating an unset `spec.replicas` as 1
pub fn replicas_from_deployment(deployment: &Deployment) -> WorkloadReplicas {
    let to_count = |n: i32| n.max(0) as u32;

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .map(to_count)
        .unwrap_or(1);
    let status = deployment.status.as_ref();

    WorkloadReplicas {
        desired,
        current: status.and_then(|s| s.replicas).map(to_count),
        available: status.and_then(|s| s.available_replicas).map(to_count),
    }
}

fn template_has_annotations(deployment: &Deployment) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.annotations.as_ref())
        .is_some()
}

/// Orchestrator backed by the Kubernetes apps/v1 API
#[derive(Clone)]
pub struct KubeOrchestrator {
    client: Client,
    bounds: Bounds,
    restart_annotation: String,
}

impl KubeOrchestrator {
    /// Build from in-cluster or kubeconfig credentials
    pub async fn connect(
        bounds: Bounds,
        restart_annotation: impl Into<String>,
    ) -> Result<Self, OrchestrationError> {
        let client = Client::try_default()
            .await
            .map_err(|e| OrchestrationError::Session(Box::new(e)))?;
        Ok(Self::with_client(client, bounds, restart_annotation))
    }

    pub fn with_client(client: Client, bounds: Bounds, restart_annotation: impl Into<String>) -> Self {
        Self {
            client,
            bounds,
            restart_annotation: restart_annotation.into(),
        }
    }

    fn deployments(&self, target: &WorkloadTarget) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &target.namespace)
    }

    async fn read(&self, target: &WorkloadTarget) -> Result<Deployment, OrchestrationError> {
        self.deployments(target)
            .get(&target.name)
            .await
            .map_err(|e| OrchestrationError::Read {
                target: target.to_string(),
                source: Box::new(e),
            })
    }

    async fn apply(
        &self,
        target: &WorkloadTarget,
        patch: json_patch::Patch,
    ) -> Result<(), OrchestrationError> {
        self.deployments(target)
            .patch(&target.name, &PatchParams::default(), &Patch::Json::<()>(patch))
            .await
            .map(|_| ())
            .map_err(|e| OrchestrationError::Write {
                target: target.to_string(),
                source: Box::new(e),
            })
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn get_replicas(
        &self,
        target: &WorkloadTarget,
    ) -> Result<WorkloadReplicas, OrchestrationError> {
        let deployment = self.read(target).await?;
        Ok(replicas_from_deployment(&deployment))
    }

    async fn patch_replicas(
        &self,
        target: &WorkloadTarget,
        replicas: i64,
    ) -> Result<u32, OrchestrationError> {
        let clamped = self.bounds.clamp(replicas);
        if clamped as i64 != replicas {
            debug!(
                requested = replicas,
                clamped,
                min = self.bounds.min(),
                max = self.bounds.max(),
                "Clamped replica request into bounds"
            );
        }

        self.apply(target, replicas_patch(clamped)).await?;
        info!(workload = %target, replicas = clamped, "Patched replicas");
        Ok(clamped)
    }

    async fn patch_restart(
        &self,
        target: &WorkloadTarget,
        timestamp: &str,
    ) -> Result<(), OrchestrationError> {
        let deployment = self.read(target).await?;
        let patch = restart_patch(
            &self.restart_annotation,
            timestamp,
            template_has_annotations(&deployment),
            deployment.metadata.resource_version.as_deref(),
        );

        self.apply(target, patch).await?;
        info!(
            workload = %target,
            annotation = %self.restart_annotation,
            timestamp = %timestamp,
            "Triggered rollout restart"
        );
        Ok(())
    }
}
