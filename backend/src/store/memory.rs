// In-memory Store implementation
//
// Backs tests and local runs without a database. All maps live behind a
// single async RwLock; operations clone rows out so callers never hold the
// lock across an await point.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tenantflow_shared::{
    Agent, AutomationExecution, AutomationRule, Communication, Container, ContainerEvent,
    ContainerStatus, DeploymentLog, Lead, ScheduledExecution, ScheduledStatus, WorkflowTemplate,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::error::{ApiResult, AppError};

#[derive(Default)]
struct Tables {
    containers: HashMap<Uuid, Container>,
    // tenant -> current container id
    current_container: HashMap<Uuid, Uuid>,
    container_events: Vec<ContainerEvent>,
    agents: HashMap<Uuid, Agent>,
    templates: HashMap<Uuid, WorkflowTemplate>,
    rules: HashMap<Uuid, AutomationRule>,
    scheduled: HashMap<Uuid, ScheduledExecution>,
    executions: Vec<AutomationExecution>,
    deployment_logs: Vec<DeploymentLog>,
    leads: HashMap<Uuid, Lead>,
    communications: Vec<Communication>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn current_container(&self, tenant_id: Uuid) -> ApiResult<Option<Container>> {
        let tables = self.tables.read().await;
        Ok(tables
            .current_container
            .get(&tenant_id)
            .and_then(|id| tables.containers.get(id))
            .filter(|c| c.status != ContainerStatus::Failed)
            .cloned())
    }

    async fn insert_container(&self, container: &Container) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .current_container
            .insert(container.tenant_id, container.id);
        tables.containers.insert(container.id, container.clone());
        Ok(())
    }

    async fn update_container(&self, container: &Container) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        tables.containers.insert(container.id, container.clone());
        Ok(())
    }

    async fn containers_in_transition(&self) -> ApiResult<Vec<Container>> {
        let tables = self.tables.read().await;
        Ok(tables
            .containers
            .values()
            .filter(|c| c.status.is_transitional())
            .cloned()
            .collect())
    }

    async fn insert_container_event(&self, event: &ContainerEvent) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .container_events
            .push(event.clone());
        Ok(())
    }

    async fn list_container_events(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<ContainerEvent>> {
        let tables = self.tables.read().await;
        let mut events: Vec<ContainerEvent> = tables
            .container_events
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.at.cmp(&a.at));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn insert_agent(&self, agent: &Agent) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .agents
            .insert(agent.id, agent.clone());
        Ok(())
    }

    async fn update_agent(&self, agent: &Agent) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .agents
            .insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get_agent(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<Agent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .agents
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn insert_template(&self, template: &WorkflowTemplate) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .templates
            .insert(template.id, template.clone());
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> ApiResult<Option<WorkflowTemplate>> {
        Ok(self.tables.read().await.templates.get(&id).cloned())
    }

    async fn insert_rule(&self, rule: &AutomationRule) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .rules
            .insert(rule.id, rule.clone());
        Ok(())
    }

    async fn get_rule(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<AutomationRule>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rules
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_rule(&self, rule: &AutomationRule) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .rules
            .insert(rule.id, rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .rules
            .get(&id)
            .map(|r| r.tenant_id == tenant_id)
            .unwrap_or(false);
        if owned {
            tables.rules.remove(&id);
        }
        Ok(owned)
    }

    async fn list_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<AutomationRule> = tables
            .rules
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rules)
    }

    async fn active_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>> {
        let mut rules = self.list_rules(tenant_id).await?;
        rules.retain(|r| r.is_active);
        Ok(rules)
    }

    async fn try_insert_scheduled(&self, scheduled: &ScheduledExecution) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.scheduled.values().any(|s| {
            s.rule_id == scheduled.rule_id
                && s.lead_id == scheduled.lead_id
                && s.trigger_event_id == scheduled.trigger_event_id
        });
        if duplicate {
            return Err(AppError::DuplicateExecution);
        }
        tables.scheduled.insert(scheduled.id, scheduled.clone());
        Ok(())
    }

    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> ApiResult<Vec<ScheduledExecution>> {
        let mut tables = self.tables.write().await;
        let mut due: Vec<Uuid> = tables
            .scheduled
            .values()
            .filter(|s| s.status == ScheduledStatus::Pending && s.execute_at <= now)
            .map(|s| s.id)
            .collect();
        due.sort_by_key(|id| tables.scheduled[id].execute_at);
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(row) = tables.scheduled.get_mut(&id) {
                row.status = ScheduledStatus::Executing;
                claimed.push(row.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_scheduled(&self, id: Uuid, status: ScheduledStatus) -> ApiResult<()> {
        if let Some(row) = self.tables.write().await.scheduled.get_mut(&id) {
            row.status = status;
        }
        Ok(())
    }

    async fn requeue_stale_executing(&self, older_than: DateTime<Utc>) -> ApiResult<u64> {
        let mut tables = self.tables.write().await;
        let mut requeued = 0;
        for row in tables.scheduled.values_mut() {
            if row.status == ScheduledStatus::Executing && row.execute_at <= older_than {
                row.status = ScheduledStatus::Pending;
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn cancel_pending_for_rule(&self, rule_id: Uuid) -> ApiResult<u64> {
        let mut tables = self.tables.write().await;
        let mut cancelled = 0;
        for row in tables.scheduled.values_mut() {
            if row.rule_id == rule_id && row.status == ScheduledStatus::Pending {
                row.status = ScheduledStatus::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn insert_execution(&self, execution: &AutomationExecution) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .executions
            .push(execution.clone());
        Ok(())
    }

    async fn list_executions(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<AutomationExecution>> {
        let tables = self.tables.read().await;
        let mut executions: Vec<AutomationExecution> = tables
            .executions
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        executions.truncate(limit.max(0) as usize);
        Ok(executions)
    }

    async fn insert_deployment_log(&self, log: &DeploymentLog) -> ApiResult<()> {
        self.tables.write().await.deployment_logs.push(log.clone());
        Ok(())
    }

    async fn list_deployment_logs(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<DeploymentLog>> {
        let tables = self.tables.read().await;
        let mut logs: Vec<DeploymentLog> = tables
            .deployment_logs
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.deployed_at.cmp(&a.deployed_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }

    async fn insert_lead(&self, lead: &Lead) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .leads
            .insert(lead.id, lead.clone());
        Ok(())
    }

    async fn get_lead(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<Lead>> {
        let tables = self.tables.read().await;
        Ok(tables
            .leads
            .get(&id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_lead_status(&self, tenant_id: Uuid, id: Uuid, status: &str) -> ApiResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(lead) = tables
            .leads
            .get_mut(&id)
            .filter(|l| l.tenant_id == tenant_id)
        {
            lead.status = status.to_string();
        }
        Ok(())
    }

    async fn insert_communication(&self, communication: &Communication) -> ApiResult<()> {
        self.tables
            .write()
            .await
            .communications
            .push(communication.clone());
        Ok(())
    }

    async fn list_communications(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> ApiResult<Vec<Communication>> {
        let tables = self.tables.read().await;
        Ok(tables
            .communications
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.lead_id == lead_id)
            .cloned()
            .collect())
    }
}
