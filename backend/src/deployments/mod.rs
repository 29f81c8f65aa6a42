// Deployment Pipeline
//
// Turns a workflow template plus tenant overrides into a running agent.
// Contract: an agent row is created for every attempt that gets past
// template resolution, and a deployment log row is written for every such
// attempt, success or failure. A deployment attempt is bounded by a
// wall-clock timeout; on expiry the container is marked failed so it cannot
// sit in `deploying` forever.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tenantflow_shared::{Agent, AgentStatus, DeploymentLog, DeploymentStatus};
use tracing::{error, info};
use uuid::Uuid;

use crate::containers::ContainerManager;
use crate::error::{ApiResult, AppError};
use crate::store::Store;

pub struct DeploymentPipeline {
    store: Arc<dyn Store>,
    containers: Arc<ContainerManager>,
    deploy_timeout: Duration,
}

/// What a finished deployment attempt looks like to the caller. `agent`
/// carries the final status; failed attempts are a normal outcome, not an
/// error, when the cause was the runtime or the clock.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub agent: Agent,
    pub log: DeploymentLog,
}

/// Overrides win key-by-key at the top level; nested objects are replaced
/// wholesale, not merged.
fn merge_configuration(
    base: &serde_json::Value,
    overrides: &serde_json::Value,
) -> serde_json::Value {
    match (base.as_object(), overrides.as_object()) {
        (Some(base_map), Some(override_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in override_map {
                merged.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(merged)
        }
        (_, Some(_)) => overrides.clone(),
        (_, None) if !overrides.is_null() => overrides.clone(),
        _ => base.clone(),
    }
}

impl DeploymentPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        containers: Arc<ContainerManager>,
        deploy_timeout: Duration,
    ) -> Self {
        Self {
            store,
            containers,
            deploy_timeout,
        }
    }

    pub async fn deploy_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        name: &str,
        overrides: &serde_json::Value,
    ) -> ApiResult<DeploymentOutcome> {
        // Template resolution happens before any row is written; an unknown
        // template leaves no trace.
        let template = self
            .store
            .get_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("template {}", template_id)))?;

        let configuration = merge_configuration(&template.configuration, overrides);

        let mut agent = Agent {
            id: Uuid::new_v4(),
            tenant_id,
            template_id: Some(template.id),
            name: name.to_string(),
            status: AgentStatus::Deploying,
            configuration: configuration.clone(),
            workflow_ref: None,
            created_at: Utc::now(),
        };
        self.store.insert_agent(&agent).await?;

        let workflow = json!({
            "agent_id": agent.id,
            "template": template.name,
            "configuration": configuration,
        });

        // Provision (or fetch) the container first so a failed attempt's
        // log row can still name the container it burned.
        let (container_id, result) = match self.containers.ensure_container(tenant_id).await {
            Ok(container) => {
                let container_id = container.id;
                let deploy = self.containers.deploy(tenant_id, &workflow);
                let result = match tokio::time::timeout(self.deploy_timeout, deploy).await {
                    Ok(result) => result,
                    Err(_) => {
                        self.containers
                            .mark_failed(tenant_id, "deployment timed out")
                            .await?;
                        Err(AppError::Timeout(format!(
                            "deployment exceeded {}s",
                            self.deploy_timeout.as_secs()
                        )))
                    }
                };
                (Some(container_id), result)
            }
            Err(e) => (None, Err(e)),
        };

        match result {
            Ok((container, workflow_ref)) => {
                agent.status = AgentStatus::Active;
                agent.workflow_ref = Some(workflow_ref.clone());
                self.store.update_agent(&agent).await?;

                let log = self
                    .record_log(
                        &agent,
                        Some(container.id),
                        DeploymentStatus::Success,
                        json!({ "workflow_ref": workflow_ref }),
                    )
                    .await?;

                info!(
                    tenant_id = %tenant_id,
                    agent_id = %agent.id,
                    "agent deployed into container {}",
                    container.id
                );
                Ok(DeploymentOutcome { agent, log })
            }
            Err(e) => {
                agent.status = AgentStatus::Failed;
                self.store.update_agent(&agent).await?;

                let log = self
                    .record_log(
                        &agent,
                        container_id,
                        DeploymentStatus::Failed,
                        json!({ "error": e.to_string() }),
                    )
                    .await?;

                error!(
                    tenant_id = %tenant_id,
                    agent_id = %agent.id,
                    "deployment failed: {}",
                    e
                );

                // Runtime and clock failures are a well-formed failed outcome;
                // caller mistakes (bad lifecycle state, bad input) propagate.
                match e {
                    AppError::ExternalService { .. } | AppError::Timeout(_) => {
                        Ok(DeploymentOutcome { agent, log })
                    }
                    other => Err(other),
                }
            }
        }
    }

    async fn record_log(
        &self,
        agent: &Agent,
        container_id: Option<Uuid>,
        status: DeploymentStatus,
        metadata: serde_json::Value,
    ) -> ApiResult<DeploymentLog> {
        let log = DeploymentLog {
            id: Uuid::new_v4(),
            tenant_id: agent.tenant_id,
            agent_id: agent.id,
            template_id: agent.template_id,
            container_id,
            status,
            deployed_at: Utc::now(),
            metadata,
        };
        self.store.insert_deployment_log(&log).await?;
        Ok(log)
    }
}
