// Container Lifecycle Manager
//
// Owns the per-tenant container state machine. All mutations to a tenant's
// container go through this manager, serialized by a per-tenant async lock,
// so at most one non-failed container ever exists per tenant. Every
// transition writes the container row first, then appends one audit event.

pub mod runtime;

pub use runtime::{ContainerRuntime, HttpContainerRuntime, PushReceipt};

use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tenantflow_shared::{Container, ContainerEvent, ContainerResources, ContainerStatus};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ContainerConfig;
use crate::error::{ApiResult, AppError};
use crate::store::Store;

/// Legal lifecycle transitions. `Failed` is reachable from any state on an
/// unrecoverable runtime error and is terminal.
fn allowed(from: ContainerStatus, to: ContainerStatus) -> bool {
    use ContainerStatus::*;
    matches!(
        (from, to),
        (Provisioning, Deploying)
            | (Deploying, Running)
            | (Running, Restarting)
            | (Restarting, Running)
            | (Running, Stopping)
            | (Stopping, Stopped)
            | (Stopped, Deploying)
    ) || (to == Failed && from != Failed)
}

pub struct ContainerManager {
    store: Arc<dyn Store>,
    runtime: Arc<dyn ContainerRuntime>,
    config: ContainerConfig,
    // One lock per tenant; taken for the whole span of any lifecycle
    // operation, including the runtime calls in the middle.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ContainerManager {
    pub fn new(
        store: Arc<dyn Store>,
        runtime: Arc<dyn ContainerRuntime>,
        config: ContainerConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn tenant_lock(&self, tenant_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Persist a transition and append its audit event. Callers have already
    /// checked the operation's precondition; this is the last line of
    /// defense for the transition table itself.
    async fn transition(
        &self,
        container: &mut Container,
        to: ContainerStatus,
        action: &str,
        event_type: &str,
        extra: serde_json::Value,
    ) -> ApiResult<()> {
        let from = container.status;
        if !allowed(from, to) {
            return Err(AppError::InvalidStateTransition {
                from,
                action: action.to_string(),
            });
        }

        container.status = to;
        container.updated_at = Utc::now();
        if to == ContainerStatus::Stopped {
            container.stopped_at = Some(container.updated_at);
        }
        self.store.update_container(container).await?;

        let mut metadata = json!({
            "from": from.as_str(),
            "to": to.as_str(),
        });
        if let (Some(map), Some(extra_map)) = (metadata.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_map {
                map.insert(k.clone(), v.clone());
            }
        }
        self.record_event(container, event_type, metadata).await?;

        info!(
            tenant_id = %container.tenant_id,
            container_id = %container.id,
            "container {} -> {}",
            from.as_str(),
            to.as_str()
        );
        Ok(())
    }

    async fn record_event(
        &self,
        container: &Container,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> ApiResult<()> {
        let event = ContainerEvent {
            id: Uuid::new_v4(),
            container_id: container.id,
            tenant_id: container.tenant_id,
            event_type: event_type.to_string(),
            metadata,
            at: Utc::now(),
        };
        self.store.insert_container_event(&event).await
    }

    /// Return the tenant's container, creating one when none exists. A new
    /// container is written in `provisioning` before the runtime is asked to
    /// create it, so a crash mid-call leaves a visible transitional row for
    /// the sweep rather than an orphaned runtime resource nobody knows about.
    pub async fn ensure_container(&self, tenant_id: Uuid) -> ApiResult<Container> {
        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;
        self.ensure_locked(tenant_id).await
    }

    async fn ensure_locked(&self, tenant_id: Uuid) -> ApiResult<Container> {
        if let Some(existing) = self.store.current_container(tenant_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let mut container = Container {
            id: Uuid::new_v4(),
            tenant_id,
            status: ContainerStatus::Provisioning,
            region: self.config.region.clone(),
            resources: ContainerResources {
                cpu_millis: self.config.cpu_millis,
                memory_mb: self.config.memory_mb,
            },
            created_at: now,
            updated_at: now,
            deployed_at: None,
            stopped_at: None,
            workflow: None,
        };
        self.store.insert_container(&container).await?;
        self.record_event(&container, "provisioning_started", json!({}))
            .await?;

        if let Err(e) = self.runtime.create(&container).await {
            self.fail_locked(&mut container, "provisioning_failed", &e)
                .await?;
            return Err(e);
        }

        Ok(container)
    }

    /// Push a workflow into the tenant's container, provisioning one first
    /// when needed. Accepted from `provisioning` (first deploy) and
    /// `stopped` (redeploy into the same container); every other state is an
    /// invalid transition.
    pub async fn deploy(
        &self,
        tenant_id: Uuid,
        workflow: &serde_json::Value,
    ) -> ApiResult<(Container, String)> {
        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;

        let mut container = self.ensure_locked(tenant_id).await?;
        match container.status {
            ContainerStatus::Provisioning => {
                self.transition(
                    &mut container,
                    ContainerStatus::Deploying,
                    "deploy",
                    "deploy_started",
                    json!({}),
                )
                .await?;
            }
            ContainerStatus::Stopped => {
                self.transition(
                    &mut container,
                    ContainerStatus::Deploying,
                    "deploy",
                    "deploy_started",
                    json!({ "redeploy": true }),
                )
                .await?;
            }
            from => {
                return Err(AppError::InvalidStateTransition {
                    from,
                    action: "deploy".to_string(),
                });
            }
        }

        match self.runtime.push(&container, workflow).await {
            Ok(receipt) => {
                container.deployed_at = Some(Utc::now());
                container.stopped_at = None;
                container.workflow = Some(workflow.clone());
                self.transition(
                    &mut container,
                    ContainerStatus::Running,
                    "deploy",
                    "deploy_succeeded",
                    json!({ "workflow_ref": receipt.workflow_ref }),
                )
                .await?;
                Ok((container, receipt.workflow_ref))
            }
            Err(e) => {
                self.fail_locked(&mut container, "deploy_failed", &e).await?;
                Err(e)
            }
        }
    }

    /// Stop the tenant's running container. Legal from `running` and
    /// `restarting`.
    pub async fn stop(&self, tenant_id: Uuid) -> ApiResult<Container> {
        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;

        let mut container = self.require_container(tenant_id).await?;
        if !matches!(
            container.status,
            ContainerStatus::Running | ContainerStatus::Restarting
        ) {
            return Err(AppError::InvalidStateTransition {
                from: container.status,
                action: "stop".to_string(),
            });
        }

        self.transition(
            &mut container,
            ContainerStatus::Stopping,
            "stop",
            "stop_requested",
            json!({}),
        )
        .await?;

        if let Err(e) = self.runtime.terminate(&container).await {
            self.fail_locked(&mut container, "stop_failed", &e).await?;
            return Err(e);
        }

        self.transition(
            &mut container,
            ContainerStatus::Stopped,
            "stop",
            "stopped",
            json!({}),
        )
        .await?;
        Ok(container)
    }

    /// Restart the tenant's container in place. Legal only from `running`.
    /// The recreated runtime instance starts empty, so the workflow recorded
    /// at deploy time is pushed again before the container is reported
    /// `running`.
    pub async fn restart(&self, tenant_id: Uuid) -> ApiResult<Container> {
        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;

        let mut container = self.require_container(tenant_id).await?;
        if container.status != ContainerStatus::Running {
            return Err(AppError::InvalidStateTransition {
                from: container.status,
                action: "restart".to_string(),
            });
        }
        let Some(workflow) = container.workflow.clone() else {
            return Err(AppError::Internal(format!(
                "container {} is running with no recorded workflow",
                container.id
            )));
        };

        self.transition(
            &mut container,
            ContainerStatus::Restarting,
            "restart",
            "restart_requested",
            json!({}),
        )
        .await?;

        if let Err(e) = self.runtime.terminate(&container).await {
            self.fail_locked(&mut container, "restart_failed", &e).await?;
            return Err(e);
        }
        if let Err(e) = self.runtime.create(&container).await {
            self.fail_locked(&mut container, "restart_failed", &e).await?;
            return Err(e);
        }
        let receipt = match self.runtime.push(&container, &workflow).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.fail_locked(&mut container, "restart_failed", &e).await?;
                return Err(e);
            }
        };

        self.transition(
            &mut container,
            ContainerStatus::Running,
            "restart",
            "restarted",
            json!({ "workflow_ref": receipt.workflow_ref }),
        )
        .await?;
        Ok(container)
    }

    pub async fn status(&self, tenant_id: Uuid) -> ApiResult<Container> {
        self.require_container(tenant_id).await
    }

    /// Force the tenant's container to `failed`, recording the reason. Used
    /// by the pipeline when a deployment attempt exceeds its wall-clock
    /// budget. A no-op when the tenant has no live container.
    pub async fn mark_failed(&self, tenant_id: Uuid, reason: &str) -> ApiResult<()> {
        let lock = self.tenant_lock(tenant_id).await;
        let _guard = lock.lock().await;

        if let Some(mut container) = self.store.current_container(tenant_id).await? {
            warn!(
                tenant_id = %tenant_id,
                container_id = %container.id,
                "marking container failed: {}",
                reason
            );
            self.transition(
                &mut container,
                ContainerStatus::Failed,
                "mark_failed",
                "failed",
                json!({ "reason": reason }),
            )
            .await?;
        }
        Ok(())
    }

    /// Reconciliation sweep: mark failed every container that has sat in a
    /// transitional state longer than the stuck threshold. Returns how many
    /// were swept.
    pub async fn sweep_stuck(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        let threshold = chrono::Duration::seconds(self.config.stuck_threshold_secs);
        let candidates = self.store.containers_in_transition().await?;
        let mut swept = 0u64;

        for candidate in candidates {
            if now - candidate.updated_at < threshold {
                continue;
            }

            let lock = self.tenant_lock(candidate.tenant_id).await;
            let _guard = lock.lock().await;

            // Re-read under the lock; an in-flight operation may have moved
            // the container on since the listing.
            let Some(mut container) = self.store.current_container(candidate.tenant_id).await?
            else {
                continue;
            };
            if container.id != candidate.id
                || !container.status.is_transitional()
                || now - container.updated_at < threshold
            {
                continue;
            }

            let stuck_in = container.status.as_str();
            error!(
                tenant_id = %container.tenant_id,
                container_id = %container.id,
                "container stuck in {} since {}, sweeping to failed",
                stuck_in,
                container.updated_at
            );
            self.transition(
                &mut container,
                ContainerStatus::Failed,
                "sweep",
                "swept_failed",
                json!({ "stuck_in": stuck_in }),
            )
            .await?;
            swept += 1;
        }

        Ok(swept)
    }

    async fn require_container(&self, tenant_id: Uuid) -> ApiResult<Container> {
        self.store
            .current_container(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("container for tenant {}", tenant_id)))
    }

    async fn fail_locked(
        &self,
        container: &mut Container,
        event_type: &str,
        cause: &AppError,
    ) -> ApiResult<()> {
        error!(
            tenant_id = %container.tenant_id,
            container_id = %container.id,
            "{}: {}",
            event_type,
            cause
        );
        self.transition(
            container,
            ContainerStatus::Failed,
            "mark_failed",
            event_type,
            json!({ "reason": cause.to_string() }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_strict() {
        use ContainerStatus::*;

        assert!(allowed(Provisioning, Deploying));
        assert!(allowed(Deploying, Running));
        assert!(allowed(Running, Restarting));
        assert!(allowed(Restarting, Running));
        assert!(allowed(Running, Stopping));
        assert!(allowed(Stopping, Stopped));
        assert!(allowed(Stopped, Deploying));

        // Failed is reachable from anywhere and terminal.
        for from in [
            Provisioning,
            Deploying,
            Running,
            Restarting,
            Stopping,
            Stopped,
        ] {
            assert!(allowed(from, Failed));
        }
        for to in [
            Provisioning,
            Deploying,
            Running,
            Restarting,
            Stopping,
            Stopped,
            Failed,
        ] {
            assert!(!allowed(Failed, to));
        }

        assert!(!allowed(Running, Deploying));
        assert!(!allowed(Stopped, Running));
        assert!(!allowed(Provisioning, Running));
        assert!(!allowed(Stopping, Running));
    }
}
