// Orchestrator - the façade the HTTP layer talks to
//
// Thin composition over the lifecycle manager, the deployment pipeline and
// the rule engine. No business logic of its own beyond input validation and
// the cancellation hook on rule deactivation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tenantflow_shared::{
    AutomationExecution, AutomationRule, Communication, Container, ContainerEvent, DeploymentLog,
    Lead, RuleAction, Trigger, TriggerEvent, WorkflowTemplate,
};
use uuid::Uuid;

use crate::automations::{AutomationEngine, EventOutcome};
use crate::channels::{ChannelCredentials, SecretStore};
use crate::containers::ContainerManager;
use crate::deployments::{DeploymentOutcome, DeploymentPipeline};
use crate::error::{ApiResult, AppError};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(Self::Stop),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }
}

/// Partial update for an automation rule; absent fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub trigger: Option<Trigger>,
    pub action: Option<RuleAction>,
    pub delay_minutes: Option<i64>,
    pub is_active: Option<bool>,
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    secrets: Arc<dyn SecretStore>,
    containers: Arc<ContainerManager>,
    pipeline: DeploymentPipeline,
    engine: AutomationEngine,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        secrets: Arc<dyn SecretStore>,
        containers: Arc<ContainerManager>,
        pipeline: DeploymentPipeline,
        engine: AutomationEngine,
    ) -> Self {
        Self {
            store,
            secrets,
            containers,
            pipeline,
            engine,
        }
    }

    // ===== Deployments =====

    pub async fn request_deployment(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        name: &str,
        overrides: &serde_json::Value,
    ) -> ApiResult<DeploymentOutcome> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("agent name must not be empty".to_string()));
        }
        self.pipeline
            .deploy_template(tenant_id, template_id, name, overrides)
            .await
    }

    pub async fn list_deployment_logs(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<DeploymentLog>> {
        self.store.list_deployment_logs(tenant_id, limit).await
    }

    // ===== Containers =====

    pub async fn container_action(
        &self,
        tenant_id: Uuid,
        action: ContainerAction,
    ) -> ApiResult<Container> {
        match action {
            ContainerAction::Stop => self.containers.stop(tenant_id).await,
            ContainerAction::Restart => self.containers.restart(tenant_id).await,
        }
    }

    pub async fn container_status(&self, tenant_id: Uuid) -> ApiResult<Container> {
        self.containers.status(tenant_id).await
    }

    pub async fn list_container_events(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<ContainerEvent>> {
        self.store.list_container_events(tenant_id, limit).await
    }

    // ===== Events & executions =====

    pub async fn notify_event(&self, event: &TriggerEvent) -> ApiResult<EventOutcome> {
        self.engine.handle_event(event).await
    }

    pub async fn list_executions(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<AutomationExecution>> {
        self.store.list_executions(tenant_id, limit).await
    }

    // ===== Background work, driven by the job scheduler =====

    pub async fn run_due_executions(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        self.engine.run_due(now).await
    }

    pub async fn sweep_stuck_containers(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        self.containers.sweep_stuck(now).await
    }

    // ===== Automation rules =====

    pub async fn create_rule(
        &self,
        tenant_id: Uuid,
        trigger: Trigger,
        action: RuleAction,
        delay_minutes: i64,
    ) -> ApiResult<AutomationRule> {
        if delay_minutes < 0 {
            return Err(AppError::Validation(
                "delay_minutes must not be negative".to_string(),
            ));
        }

        let rule = AutomationRule {
            id: Uuid::new_v4(),
            tenant_id,
            trigger,
            action,
            delay_minutes,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.insert_rule(&rule).await?;
        Ok(rule)
    }

    pub async fn list_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>> {
        self.store.list_rules(tenant_id).await
    }

    pub async fn get_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> ApiResult<AutomationRule> {
        self.store
            .get_rule(tenant_id, rule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("rule {}", rule_id)))
    }

    /// Apply a partial update. Deactivating a rule also cancels its pending
    /// scheduled executions; rows already claimed keep running.
    pub async fn update_rule(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
        update: RuleUpdate,
    ) -> ApiResult<AutomationRule> {
        let mut rule = self.get_rule(tenant_id, rule_id).await?;
        let was_active = rule.is_active;

        if let Some(trigger) = update.trigger {
            rule.trigger = trigger;
        }
        if let Some(action) = update.action {
            rule.action = action;
        }
        if let Some(delay_minutes) = update.delay_minutes {
            if delay_minutes < 0 {
                return Err(AppError::Validation(
                    "delay_minutes must not be negative".to_string(),
                ));
            }
            rule.delay_minutes = delay_minutes;
        }
        if let Some(is_active) = update.is_active {
            rule.is_active = is_active;
        }

        self.store.update_rule(&rule).await?;

        if was_active && !rule.is_active {
            self.engine.cancel_rule_pending(rule.id).await?;
        }
        Ok(rule)
    }

    pub async fn delete_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> ApiResult<()> {
        self.engine.cancel_rule_pending(rule_id).await?;
        if !self.store.delete_rule(tenant_id, rule_id).await? {
            return Err(AppError::NotFound(format!("rule {}", rule_id)));
        }
        Ok(())
    }

    // ===== Leads =====

    pub async fn create_lead(
        &self,
        tenant_id: Uuid,
        name: &str,
        phone: Option<String>,
        email: Option<String>,
    ) -> ApiResult<Lead> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("lead name must not be empty".to_string()));
        }

        let lead = Lead {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            phone,
            email,
            status: "new".to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_lead(&lead).await?;
        Ok(lead)
    }

    pub async fn get_lead(&self, tenant_id: Uuid, lead_id: Uuid) -> ApiResult<Lead> {
        self.store
            .get_lead(tenant_id, lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("lead {}", lead_id)))
    }

    pub async fn list_communications(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> ApiResult<Vec<Communication>> {
        self.store.list_communications(tenant_id, lead_id).await
    }

    // ===== Templates =====

    pub async fn create_template(
        &self,
        name: &str,
        description: Option<String>,
        configuration: serde_json::Value,
    ) -> ApiResult<WorkflowTemplate> {
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "template name must not be empty".to_string(),
            ));
        }

        let template = WorkflowTemplate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
            configuration,
            created_at: Utc::now(),
        };
        self.store.insert_template(&template).await?;
        Ok(template)
    }

    pub async fn get_template(&self, template_id: Uuid) -> ApiResult<WorkflowTemplate> {
        self.store
            .get_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("template {}", template_id)))
    }

    // ===== Channel credentials =====

    pub async fn store_credentials(
        &self,
        tenant_id: Uuid,
        service: &str,
        credentials: ChannelCredentials,
    ) -> ApiResult<()> {
        self.secrets.store(tenant_id, service, credentials).await
    }

    pub async fn delete_credentials(&self, tenant_id: Uuid, service: &str) -> ApiResult<()> {
        self.secrets.delete(tenant_id, service).await
    }
}
