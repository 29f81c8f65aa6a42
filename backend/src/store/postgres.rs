// Postgres Store implementation
//
// Runtime-checked sqlx queries; rows are selected as tuples and mapped into
// the shared model types. Statuses are stored as text, triggers and actions
// as jsonb.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tenantflow_shared::{
    Agent, AgentStatus, AutomationExecution, AutomationRule, Channel, Communication, Container,
    ContainerEvent, ContainerResources, ContainerStatus, DeploymentLog, DeploymentStatus,
    ExecutionStatus, Lead, RuleAction, ScheduledExecution, ScheduledStatus, Trigger,
    WorkflowTemplate,
};
use uuid::Uuid;

use super::Store;
use crate::error::{ApiResult, AppError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type ContainerRow = (
    Uuid,
    Uuid,
    String,
    String,
    i32,
    i32,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Option<serde_json::Value>,
);

fn container_from_row(row: ContainerRow) -> ApiResult<Container> {
    let status = ContainerStatus::parse(&row.2)
        .ok_or_else(|| AppError::Internal(format!("unknown container status '{}'", row.2)))?;
    Ok(Container {
        id: row.0,
        tenant_id: row.1,
        status,
        region: row.3,
        resources: ContainerResources {
            cpu_millis: row.4,
            memory_mb: row.5,
        },
        created_at: row.6,
        updated_at: row.7,
        deployed_at: row.8,
        stopped_at: row.9,
        workflow: row.10,
    })
}

type RuleRow = (
    Uuid,
    Uuid,
    serde_json::Value,
    serde_json::Value,
    i64,
    bool,
    DateTime<Utc>,
);

fn rule_from_row(row: RuleRow) -> ApiResult<AutomationRule> {
    let trigger: Trigger = serde_json::from_value(row.2)?;
    let action: RuleAction = serde_json::from_value(row.3)?;
    Ok(AutomationRule {
        id: row.0,
        tenant_id: row.1,
        trigger,
        action,
        delay_minutes: row.4,
        is_active: row.5,
        created_at: row.6,
    })
}

type ScheduledRow = (
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    serde_json::Value,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn scheduled_from_row(row: ScheduledRow) -> ApiResult<ScheduledExecution> {
    let action: RuleAction = serde_json::from_value(row.5)?;
    let status = ScheduledStatus::parse(&row.6)
        .ok_or_else(|| AppError::Internal(format!("unknown scheduled status '{}'", row.6)))?;
    Ok(ScheduledExecution {
        id: row.0,
        tenant_id: row.1,
        rule_id: row.2,
        lead_id: row.3,
        trigger_event_id: row.4,
        action,
        status,
        execute_at: row.7,
        created_at: row.8,
    })
}

const CONTAINER_COLUMNS: &str = "id, tenant_id, status, region, cpu_millis, memory_mb, \
     created_at, updated_at, deployed_at, stopped_at, workflow";

const SCHEDULED_COLUMNS: &str = "id, tenant_id, rule_id, lead_id, trigger_event_id, action, \
     status, execute_at, created_at";

#[async_trait]
impl Store for PgStore {
    async fn current_container(&self, tenant_id: Uuid) -> ApiResult<Option<Container>> {
        let row: Option<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM containers
             WHERE tenant_id = $1 AND status != 'failed'
             ORDER BY created_at DESC LIMIT 1",
            CONTAINER_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(container_from_row).transpose()
    }

    async fn insert_container(&self, container: &Container) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO containers
             (id, tenant_id, status, region, cpu_millis, memory_mb, created_at, updated_at, deployed_at, stopped_at, workflow)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(container.id)
        .bind(container.tenant_id)
        .bind(container.status.as_str())
        .bind(&container.region)
        .bind(container.resources.cpu_millis)
        .bind(container.resources.memory_mb)
        .bind(container.created_at)
        .bind(container.updated_at)
        .bind(container.deployed_at)
        .bind(container.stopped_at)
        .bind(&container.workflow)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_container(&self, container: &Container) -> ApiResult<()> {
        sqlx::query(
            "UPDATE containers
             SET status = $2, updated_at = $3, deployed_at = $4, stopped_at = $5, workflow = $6
             WHERE id = $1",
        )
        .bind(container.id)
        .bind(container.status.as_str())
        .bind(container.updated_at)
        .bind(container.deployed_at)
        .bind(container.stopped_at)
        .bind(&container.workflow)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn containers_in_transition(&self) -> ApiResult<Vec<Container>> {
        let rows: Vec<ContainerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM containers
             WHERE status IN ('provisioning', 'deploying', 'stopping', 'restarting')",
            CONTAINER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(container_from_row).collect()
    }

    async fn insert_container_event(&self, event: &ContainerEvent) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO container_events (id, container_id, tenant_id, event_type, metadata, at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.id)
        .bind(event.container_id)
        .bind(event.tenant_id)
        .bind(&event.event_type)
        .bind(&event.metadata)
        .bind(event.at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_container_events(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<ContainerEvent>> {
        let rows: Vec<(Uuid, Uuid, Uuid, String, serde_json::Value, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, container_id, tenant_id, event_type, metadata, at
                 FROM container_events
                 WHERE tenant_id = $1 ORDER BY at DESC LIMIT $2",
            )
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ContainerEvent {
                id: row.0,
                container_id: row.1,
                tenant_id: row.2,
                event_type: row.3,
                metadata: row.4,
                at: row.5,
            })
            .collect())
    }

    async fn insert_agent(&self, agent: &Agent) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO agents
             (id, tenant_id, template_id, name, status, configuration, workflow_ref, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(agent.id)
        .bind(agent.tenant_id)
        .bind(agent.template_id)
        .bind(&agent.name)
        .bind(agent.status.as_str())
        .bind(&agent.configuration)
        .bind(&agent.workflow_ref)
        .bind(agent.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_agent(&self, agent: &Agent) -> ApiResult<()> {
        sqlx::query("UPDATE agents SET status = $2, workflow_ref = $3 WHERE id = $1")
            .bind(agent.id)
            .bind(agent.status.as_str())
            .bind(&agent.workflow_ref)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_agent(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<Agent>> {
        let row: Option<(
            Uuid,
            Uuid,
            Option<Uuid>,
            String,
            String,
            serde_json::Value,
            Option<String>,
            DateTime<Utc>,
        )> = sqlx::query_as(
            "SELECT id, tenant_id, template_id, name, status, configuration, workflow_ref, created_at
             FROM agents WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status = AgentStatus::parse(&row.4)
                .ok_or_else(|| AppError::Internal(format!("unknown agent status '{}'", row.4)))?;
            Ok(Agent {
                id: row.0,
                tenant_id: row.1,
                template_id: row.2,
                name: row.3,
                status,
                configuration: row.5,
                workflow_ref: row.6,
                created_at: row.7,
            })
        })
        .transpose()
    }

    async fn insert_template(&self, template: &WorkflowTemplate) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO templates (id, name, description, configuration, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.configuration)
        .bind(template.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> ApiResult<Option<WorkflowTemplate>> {
        let row: Option<(Uuid, String, Option<String>, serde_json::Value, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, name, description, configuration, created_at
                 FROM templates WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| WorkflowTemplate {
            id: row.0,
            name: row.1,
            description: row.2,
            configuration: row.3,
            created_at: row.4,
        }))
    }

    async fn insert_rule(&self, rule: &AutomationRule) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO automation_rules
             (id, tenant_id, trigger, action, delay_minutes, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(rule.id)
        .bind(rule.tenant_id)
        .bind(serde_json::to_value(&rule.trigger)?)
        .bind(serde_json::to_value(&rule.action)?)
        .bind(rule.delay_minutes)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_rule(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<AutomationRule>> {
        let row: Option<RuleRow> = sqlx::query_as(
            "SELECT id, tenant_id, trigger, action, delay_minutes, is_active, created_at
             FROM automation_rules WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(rule_from_row).transpose()
    }

    async fn update_rule(&self, rule: &AutomationRule) -> ApiResult<()> {
        sqlx::query(
            "UPDATE automation_rules
             SET trigger = $2, action = $3, delay_minutes = $4, is_active = $5
             WHERE id = $1",
        )
        .bind(rule.id)
        .bind(serde_json::to_value(&rule.trigger)?)
        .bind(serde_json::to_value(&rule.action)?)
        .bind(rule.delay_minutes)
        .bind(rule.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_rule(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM automation_rules WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT id, tenant_id, trigger, action, delay_minutes, is_active, created_at
             FROM automation_rules WHERE tenant_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rule_from_row).collect()
    }

    async fn active_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT id, tenant_id, trigger, action, delay_minutes, is_active, created_at
             FROM automation_rules
             WHERE tenant_id = $1 AND is_active = true ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rule_from_row).collect()
    }

    async fn try_insert_scheduled(&self, scheduled: &ScheduledExecution) -> ApiResult<()> {
        let result = sqlx::query(
            "INSERT INTO scheduled_executions
             (id, tenant_id, rule_id, lead_id, trigger_event_id, action, status, execute_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (rule_id, lead_id, trigger_event_id) DO NOTHING",
        )
        .bind(scheduled.id)
        .bind(scheduled.tenant_id)
        .bind(scheduled.rule_id)
        .bind(scheduled.lead_id)
        .bind(scheduled.trigger_event_id)
        .bind(serde_json::to_value(&scheduled.action)?)
        .bind(scheduled.status.as_str())
        .bind(scheduled.execute_at)
        .bind(scheduled.created_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::DuplicateExecution);
        }
        Ok(())
    }

    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> ApiResult<Vec<ScheduledExecution>> {
        // SKIP LOCKED keeps concurrent workers from claiming the same rows.
        let rows: Vec<ScheduledRow> = sqlx::query_as(&format!(
            "UPDATE scheduled_executions SET status = 'executing'
             WHERE id IN (
                 SELECT id FROM scheduled_executions
                 WHERE status = 'pending' AND execute_at <= $1
                 ORDER BY execute_at
                 LIMIT $2
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {}",
            SCHEDULED_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(scheduled_from_row).collect()
    }

    async fn mark_scheduled(&self, id: Uuid, status: ScheduledStatus) -> ApiResult<()> {
        sqlx::query("UPDATE scheduled_executions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn requeue_stale_executing(&self, older_than: DateTime<Utc>) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE scheduled_executions SET status = 'pending'
             WHERE status = 'executing' AND execute_at <= $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn cancel_pending_for_rule(&self, rule_id: Uuid) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE scheduled_executions SET status = 'cancelled'
             WHERE rule_id = $1 AND status = 'pending'",
        )
        .bind(rule_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_execution(&self, execution: &AutomationExecution) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO automation_executions
             (id, tenant_id, rule_id, lead_id, action_type, status, details, executed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(execution.id)
        .bind(execution.tenant_id)
        .bind(execution.rule_id)
        .bind(execution.lead_id)
        .bind(&execution.action_type)
        .bind(execution.status.as_str())
        .bind(&execution.details)
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_executions(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<AutomationExecution>> {
        let rows: Vec<(
            Uuid,
            Uuid,
            Uuid,
            Uuid,
            String,
            String,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(
            "SELECT id, tenant_id, rule_id, lead_id, action_type, status, details, executed_at
             FROM automation_executions
             WHERE tenant_id = $1 ORDER BY executed_at DESC LIMIT $2",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let status = ExecutionStatus::parse(&row.5).ok_or_else(|| {
                    AppError::Internal(format!("unknown execution status '{}'", row.5))
                })?;
                Ok(AutomationExecution {
                    id: row.0,
                    tenant_id: row.1,
                    rule_id: row.2,
                    lead_id: row.3,
                    action_type: row.4,
                    status,
                    details: row.6,
                    executed_at: row.7,
                })
            })
            .collect()
    }

    async fn insert_deployment_log(&self, log: &DeploymentLog) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO deployment_logs
             (id, tenant_id, agent_id, template_id, container_id, status, deployed_at, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(log.id)
        .bind(log.tenant_id)
        .bind(log.agent_id)
        .bind(log.template_id)
        .bind(log.container_id)
        .bind(log.status.as_str())
        .bind(log.deployed_at)
        .bind(&log.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_deployment_logs(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<DeploymentLog>> {
        let rows: Vec<(
            Uuid,
            Uuid,
            Uuid,
            Option<Uuid>,
            Option<Uuid>,
            String,
            DateTime<Utc>,
            serde_json::Value,
        )> = sqlx::query_as(
            "SELECT id, tenant_id, agent_id, template_id, container_id, status, deployed_at, metadata
             FROM deployment_logs
             WHERE tenant_id = $1 ORDER BY deployed_at DESC LIMIT $2",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let status = DeploymentStatus::parse(&row.5).ok_or_else(|| {
                    AppError::Internal(format!("unknown deployment status '{}'", row.5))
                })?;
                Ok(DeploymentLog {
                    id: row.0,
                    tenant_id: row.1,
                    agent_id: row.2,
                    template_id: row.3,
                    container_id: row.4,
                    status,
                    deployed_at: row.6,
                    metadata: row.7,
                })
            })
            .collect()
    }

    async fn insert_lead(&self, lead: &Lead) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO leads (id, tenant_id, name, phone, email, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(lead.id)
        .bind(lead.tenant_id)
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.email)
        .bind(&lead.status)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_lead(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<Lead>> {
        let row: Option<(
            Uuid,
            Uuid,
            String,
            Option<String>,
            Option<String>,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(
            "SELECT id, tenant_id, name, phone, email, status, created_at
             FROM leads WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Lead {
            id: row.0,
            tenant_id: row.1,
            name: row.2,
            phone: row.3,
            email: row.4,
            status: row.5,
            created_at: row.6,
        }))
    }

    async fn update_lead_status(&self, tenant_id: Uuid, id: Uuid, status: &str) -> ApiResult<()> {
        sqlx::query("UPDATE leads SET status = $3 WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_communication(&self, communication: &Communication) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO communications
             (id, tenant_id, lead_id, channel, body, external_id, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(communication.id)
        .bind(communication.tenant_id)
        .bind(communication.lead_id)
        .bind(communication.channel.as_str())
        .bind(&communication.body)
        .bind(&communication.external_id)
        .bind(&communication.status)
        .bind(communication.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_communications(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> ApiResult<Vec<Communication>> {
        let rows: Vec<(
            Uuid,
            Uuid,
            Uuid,
            String,
            String,
            Option<String>,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(
            "SELECT id, tenant_id, lead_id, channel, body, external_id, status, created_at
             FROM communications
             WHERE tenant_id = $1 AND lead_id = $2 ORDER BY created_at",
        )
        .bind(tenant_id)
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let channel = Channel::parse(&row.3)
                    .ok_or_else(|| AppError::Internal(format!("unknown channel '{}'", row.3)))?;
                Ok(Communication {
                    id: row.0,
                    tenant_id: row.1,
                    lead_id: row.2,
                    channel,
                    body: row.4,
                    external_id: row.5,
                    status: row.6,
                    created_at: row.7,
                })
            })
            .collect()
    }
}
