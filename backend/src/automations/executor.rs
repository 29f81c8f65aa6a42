// Action executor
//
// Runs one rule action against one lead. Whatever happens, exactly one
// AutomationExecution row is written before returning; failures carry the
// cause in `details` and never abort sibling executions.

use chrono::Utc;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use tenantflow_shared::{
    AutomationExecution, Channel, Communication, ExecutionStatus, Lead, RuleAction,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::channels::{ChannelSender, SecretStore};
use crate::error::{ApiResult, AppError};
use crate::store::Store;

const CALL_SCRIPT: &str = "Hi {{name}}, this is a follow-up call about your recent enquiry.";

/// Replace `{{field}}` (or `{field}`) placeholders with lead fields. Unknown
/// placeholders are left as written.
fn render_template(template: &str, lead: &Lead) -> ApiResult<String> {
    let placeholder = Regex::new(r"\{+(\w+)\}+")
        .map_err(|e| AppError::Internal(format!("placeholder regex: {}", e)))?;

    Ok(placeholder
        .replace_all(template, |caps: &regex::Captures| match &caps[1] {
            "name" => lead.name.clone(),
            "phone" => lead.phone.clone().unwrap_or_default(),
            "email" => lead.email.clone().unwrap_or_default(),
            "status" => lead.status.clone(),
            _ => caps[0].to_string(),
        })
        .into_owned())
}

pub struct ActionExecutor {
    store: Arc<dyn Store>,
    secrets: Arc<dyn SecretStore>,
    sms: Arc<dyn ChannelSender>,
    voice: Arc<dyn ChannelSender>,
}

impl ActionExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        secrets: Arc<dyn SecretStore>,
        sms: Arc<dyn ChannelSender>,
        voice: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            store,
            secrets,
            sms,
            voice,
        }
    }

    /// Execute one action and record the outcome. The returned row is the
    /// audit record; an action failure is reported through its `status`, not
    /// as an `Err`.
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
        lead_id: Uuid,
        action: &RuleAction,
    ) -> ApiResult<AutomationExecution> {
        let (status, details) = match self.run(tenant_id, lead_id, action).await {
            Ok(details) => (ExecutionStatus::Success, details),
            Err(e) => {
                warn!(
                    rule_id = %rule_id,
                    lead_id = %lead_id,
                    "action {} failed: {}",
                    action.action_type(),
                    e
                );
                (ExecutionStatus::Failed, e.to_string())
            }
        };

        let execution = AutomationExecution {
            id: Uuid::new_v4(),
            tenant_id,
            rule_id,
            lead_id,
            action_type: action.action_type().to_string(),
            status,
            details,
            executed_at: Utc::now(),
        };
        self.store.insert_execution(&execution).await?;

        if execution.status == ExecutionStatus::Success {
            info!(
                rule_id = %rule_id,
                lead_id = %lead_id,
                "action {} executed",
                execution.action_type
            );
        }
        Ok(execution)
    }

    async fn run(&self, tenant_id: Uuid, lead_id: Uuid, action: &RuleAction) -> ApiResult<String> {
        let lead = self
            .store
            .get_lead(tenant_id, lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("lead {}", lead_id)))?;

        match action {
            RuleAction::SendSms { template } => {
                let body = render_template(template, &lead)?;
                self.send_via(self.sms.as_ref(), "sms", &lead, body).await
            }
            RuleAction::MakeCall => {
                let script = render_template(CALL_SCRIPT, &lead)?;
                self.send_via(self.voice.as_ref(), "voice", &lead, script)
                    .await
            }
            // No external email channel; the communication record is the
            // delivery.
            RuleAction::SendEmail { template } => {
                let body = render_template(template, &lead)?;
                let communication = Communication {
                    id: Uuid::new_v4(),
                    tenant_id,
                    lead_id,
                    channel: Channel::Email,
                    body,
                    external_id: None,
                    status: "recorded".to_string(),
                    created_at: Utc::now(),
                };
                self.store.insert_communication(&communication).await?;
                Ok(json!({ "channel": "email", "communication_id": communication.id })
                    .to_string())
            }
            RuleAction::UpdateStatus { value } => {
                self.store
                    .update_lead_status(tenant_id, lead_id, value)
                    .await?;
                Ok(json!({ "new_status": value }).to_string())
            }
        }
    }

    /// Shared sms/call path: contact check, then credentials, then the
    /// provider call. The checks run in that order so no external call is
    /// ever attempted for an unreachable lead or an unconfigured tenant.
    async fn send_via(
        &self,
        sender: &dyn ChannelSender,
        service: &str,
        lead: &Lead,
        payload: String,
    ) -> ApiResult<String> {
        let to = lead.phone.clone().ok_or_else(|| {
            AppError::MissingContactInfo(format!("lead {} has no phone number", lead.id))
        })?;
        let credentials = self.secrets.retrieve(lead.tenant_id, service).await?;

        let receipt = sender.send(&credentials, &to, &payload).await?;

        let communication = Communication {
            id: Uuid::new_v4(),
            tenant_id: lead.tenant_id,
            lead_id: lead.id,
            channel: sender.channel(),
            body: payload,
            external_id: Some(receipt.external_id.clone()),
            status: receipt.status,
            created_at: Utc::now(),
        };
        self.store.insert_communication(&communication).await?;

        Ok(json!({
            "channel": sender.channel().as_str(),
            "external_id": receipt.external_id,
            "to": to,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Ada".to_string(),
            phone: Some("+15550123".to_string()),
            email: None,
            status: "new".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn renders_double_and_single_brace_placeholders() {
        let l = lead();
        assert_eq!(
            render_template("Hi {{name}}, you are {status}.", &l).unwrap(),
            "Hi Ada, you are new."
        );
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let l = lead();
        assert_eq!(
            render_template("Hi {{name}}, ref {{ticket}}", &l).unwrap(),
            "Hi Ada, ref {{ticket}}"
        );
    }

    #[test]
    fn missing_optional_fields_render_empty() {
        let l = lead();
        assert_eq!(render_template("email: {{email}}", &l).unwrap(), "email: ");
    }
}
