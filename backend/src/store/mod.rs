// Record Store - persistence boundary of the orchestration core
//
// Everything the core persists goes through the `Store` trait: containers,
// agents, templates, automation rules, scheduled executions, execution and
// deployment logs, leads, and communications. Two implementations ship: an
// in-memory store for tests and local runs, and a Postgres store.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenantflow_shared::{
    Agent, AutomationExecution, AutomationRule, Communication, Container, ContainerEvent,
    DeploymentLog, Lead, ScheduledExecution, ScheduledStatus, WorkflowTemplate,
};
use uuid::Uuid;

use crate::error::ApiResult;

#[async_trait]
pub trait Store: Send + Sync {
    // ===== Containers =====

    /// The tenant's current (non-failed) container, if any. Failed containers
    /// are retained for audit but do not count as the tenant's live container.
    async fn current_container(&self, tenant_id: Uuid) -> ApiResult<Option<Container>>;
    async fn insert_container(&self, container: &Container) -> ApiResult<()>;
    async fn update_container(&self, container: &Container) -> ApiResult<()>;
    /// All containers currently in a transitional state, across tenants.
    /// Used by the reconciliation sweep.
    async fn containers_in_transition(&self) -> ApiResult<Vec<Container>>;

    async fn insert_container_event(&self, event: &ContainerEvent) -> ApiResult<()>;
    async fn list_container_events(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<ContainerEvent>>;

    // ===== Agents =====

    async fn insert_agent(&self, agent: &Agent) -> ApiResult<()>;
    async fn update_agent(&self, agent: &Agent) -> ApiResult<()>;
    async fn get_agent(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<Agent>>;

    // ===== Templates =====

    async fn insert_template(&self, template: &WorkflowTemplate) -> ApiResult<()>;
    async fn get_template(&self, id: Uuid) -> ApiResult<Option<WorkflowTemplate>>;

    // ===== Automation rules =====

    async fn insert_rule(&self, rule: &AutomationRule) -> ApiResult<()>;
    async fn get_rule(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<AutomationRule>>;
    async fn update_rule(&self, rule: &AutomationRule) -> ApiResult<()>;
    async fn delete_rule(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<bool>;
    async fn list_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>>;
    async fn active_rules(&self, tenant_id: Uuid) -> ApiResult<Vec<AutomationRule>>;

    // ===== Scheduled executions (durable timers) =====

    /// Insert the durable timer row. Fails with
    /// `AppError::DuplicateExecution` when the idempotency key
    /// `(rule_id, lead_id, trigger_event_id)` already exists.
    async fn try_insert_scheduled(&self, scheduled: &ScheduledExecution) -> ApiResult<()>;
    /// Atomically move due pending rows to `executing` and return them.
    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> ApiResult<Vec<ScheduledExecution>>;
    async fn mark_scheduled(&self, id: Uuid, status: ScheduledStatus) -> ApiResult<()>;
    /// Move `executing` rows due before `older_than` back to `pending`. A
    /// worker that dies mid-batch leaves such rows behind; requeueing lets a
    /// later pass claim them again.
    async fn requeue_stale_executing(&self, older_than: DateTime<Utc>) -> ApiResult<u64>;
    /// Cancel every pending row belonging to a rule. Rows already claimed
    /// are past the commit point and stay untouched.
    async fn cancel_pending_for_rule(&self, rule_id: Uuid) -> ApiResult<u64>;

    // ===== Execution log =====

    async fn insert_execution(&self, execution: &AutomationExecution) -> ApiResult<()>;
    async fn list_executions(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<AutomationExecution>>;

    // ===== Deployment logs =====

    async fn insert_deployment_log(&self, log: &DeploymentLog) -> ApiResult<()>;
    async fn list_deployment_logs(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<DeploymentLog>>;

    // ===== Leads =====

    async fn insert_lead(&self, lead: &Lead) -> ApiResult<()>;
    async fn get_lead(&self, tenant_id: Uuid, id: Uuid) -> ApiResult<Option<Lead>>;
    async fn update_lead_status(&self, tenant_id: Uuid, id: Uuid, status: &str) -> ApiResult<()>;

    // ===== Communications =====

    async fn insert_communication(&self, communication: &Communication) -> ApiResult<()>;
    async fn list_communications(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> ApiResult<Vec<Communication>>;
}
