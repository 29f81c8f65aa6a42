use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Domain model shared across the Tenantflow orchestration core. Every row
// type carries a tenant_id so stores can enforce per-tenant isolation.

/// Lifecycle states of a tenant's container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Provisioning,
    Deploying,
    Running,
    Restarting,
    Stopping,
    Stopped,
    Failed,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Deploying => "deploying",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "provisioning" => Some(Self::Provisioning),
            "deploying" => Some(Self::Deploying),
            "running" => Some(Self::Running),
            "restarting" => Some(Self::Restarting),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Intermediate states a container may get stuck in when the process
    /// crashes between the intent write and the result write. The
    /// reconciliation sweep marks these failed after a timeout.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::Provisioning | Self::Deploying | Self::Stopping | Self::Restarting
        )
    }
}

/// Compute resources allocated to a container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerResources {
    pub cpu_millis: i32,
    pub memory_mb: i32,
}

impl Default for ContainerResources {
    fn default() -> Self {
        Self {
            cpu_millis: 500,
            memory_mb: 512,
        }
    }
}

/// The isolated execution environment hosting a tenant's deployed workflow.
/// At most one non-failed container exists per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: ContainerStatus,
    pub region: String,
    pub resources: ContainerResources,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    /// The workflow definition last pushed into the runtime instance. A
    /// restart re-pushes this onto the recreated instance.
    pub workflow: Option<serde_json::Value>,
}

/// Audit trail entry for a single container lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerEvent {
    pub id: Uuid,
    pub container_id: Uuid,
    pub tenant_id: Uuid,
    pub event_type: String,
    pub metadata: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Deploying,
    Active,
    Failed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploying => "deploying",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deploying" => Some(Self::Deploying),
            "active" => Some(Self::Active),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A single deployed workflow instance backed by a template. One agent row
/// is created per deployment attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub name: String,
    pub status: AgentStatus,
    pub configuration: serde_json::Value,
    pub workflow_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A reusable workflow definition from which agents are instantiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub configuration: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Domain event kinds an automation rule can react to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    LeadCreated,
    LeadStatusChanged,
    NoResponseAfterDays,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead_created",
            Self::LeadStatusChanged => "lead_status_changed",
            Self::NoResponseAfterDays => "no_response_after_days",
        }
    }
}

/// Closed union of rule triggers. Variants carrying data require the event
/// value to match; `LeadCreated` matches unconditionally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    LeadCreated,
    LeadStatusChanged { value: String },
    NoResponseAfterDays { days: i64 },
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::LeadCreated => TriggerKind::LeadCreated,
            Self::LeadStatusChanged { .. } => TriggerKind::LeadStatusChanged,
            Self::NoResponseAfterDays { .. } => TriggerKind::NoResponseAfterDays,
        }
    }
}

/// Closed union of side-effecting actions a rule can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    SendSms { template: String },
    MakeCall,
    SendEmail { template: String },
    UpdateStatus { value: String },
}

impl RuleAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SendSms { .. } => "send_sms",
            Self::MakeCall => "make_call",
            Self::SendEmail { .. } => "send_email",
            Self::UpdateStatus { .. } => "update_status",
        }
    }
}

/// An automation rule authored by a tenant, orthogonal to the container and
/// agent lifecycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub trigger: Trigger,
    pub action: RuleAction,
    pub delay_minutes: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A domain event delivered to the rule engine. `event_id` participates in
/// the `(rule_id, lead_id, event_id)` idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: TriggerKind,
    pub lead_id: Uuid,
    pub value: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn new(tenant_id: Uuid, kind: TriggerKind, lead_id: Uuid, value: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id,
            kind,
            lead_id,
            value,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledStatus {
    Pending,
    Executing,
    Completed,
    Cancelled,
}

impl ScheduledStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "executing" => Some(Self::Executing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Durable timer row backing a delayed rule execution. The unique key
/// `(rule_id, lead_id, trigger_event_id)` is the duplicate-execution guard,
/// so retries after a crash cannot double-execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledExecution {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub rule_id: Uuid,
    pub lead_id: Uuid,
    pub trigger_event_id: Uuid,
    pub action: RuleAction,
    pub status: ScheduledStatus,
    pub execute_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Outcome record for one rule execution. Exactly one row exists per
/// `(rule_id, lead_id, trigger event)`, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationExecution {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub rule_id: Uuid,
    pub lead_id: Uuid,
    pub action_type: String,
    pub status: ExecutionStatus,
    pub details: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One row per deployment attempt, failed attempts included. Failures carry
/// the captured error in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub agent_id: Uuid,
    pub template_id: Option<Uuid>,
    pub container_id: Option<Uuid>,
    pub status: DeploymentStatus,
    pub deployed_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Minimal contact record the rule executor reads and updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Call,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Call => "call",
            Self::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sms" => Some(Self::Sms),
            "call" => Some(Self::Call),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

/// Record of an outbound message, carrying the provider id when an external
/// channel was involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Communication {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub channel: Channel,
    pub body: String,
    pub external_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_serde_round_trip() {
        let trigger = Trigger::LeadStatusChanged {
            value: "qualified".to_string(),
        };
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["type"], "lead_status_changed");
        assert_eq!(json["value"], "qualified");

        let back: Trigger = serde_json::from_value(json).unwrap();
        assert_eq!(back, trigger);
    }

    #[test]
    fn action_type_names() {
        let action = RuleAction::SendSms {
            template: "Hi {{name}}".to_string(),
        };
        assert_eq!(action.action_type(), "send_sms");
        assert_eq!(RuleAction::MakeCall.action_type(), "make_call");
        assert_eq!(
            RuleAction::UpdateStatus {
                value: "contacted".to_string()
            }
            .action_type(),
            "update_status"
        );
    }

    #[test]
    fn container_status_parse_round_trip() {
        for status in [
            ContainerStatus::Provisioning,
            ContainerStatus::Deploying,
            ContainerStatus::Running,
            ContainerStatus::Restarting,
            ContainerStatus::Stopping,
            ContainerStatus::Stopped,
            ContainerStatus::Failed,
        ] {
            assert_eq!(ContainerStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ContainerStatus::parse("unknown"), None);
    }

    #[test]
    fn transitional_states() {
        assert!(ContainerStatus::Deploying.is_transitional());
        assert!(ContainerStatus::Provisioning.is_transitional());
        assert!(!ContainerStatus::Running.is_transitional());
        assert!(!ContainerStatus::Stopped.is_transitional());
    }
}
