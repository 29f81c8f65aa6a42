// Automation engine behavior, end to end over the in-memory store

use chrono::{Duration, Utc};
use std::sync::atomic::Ordering;
use tenantflow_shared::{
    Channel, ExecutionStatus, RuleAction, Trigger, TriggerEvent, TriggerKind,
};
use uuid::Uuid;

use crate::orchestrator::RuleUpdate;
use crate::store::Store;
use crate::tests::fixtures::Harness;

#[tokio::test]
async fn immediate_sms_rule_executes_and_records_everything() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi {{name}}, thanks for reaching out!".to_string(),
            },
            0,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    let outcome = harness.orchestrator.notify_event(&event).await.unwrap();

    assert_eq!(outcome.matched_rule_ids.len(), 1);
    assert_eq!(outcome.executed_immediately_count, 1);
    assert_eq!(outcome.scheduled_count, 0);

    let sent = harness.sms.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(
        "+15550123".to_string(),
        "Hi Ada, thanks for reaching out!".to_string()
    )]);

    let executions = harness.orchestrator.list_executions(tenant, 50).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Success);
    assert_eq!(executions[0].action_type, "send_sms");

    let communications = harness
        .orchestrator
        .list_communications(tenant, lead.id)
        .await
        .unwrap();
    assert_eq!(communications.len(), 1);
    assert_eq!(communications[0].channel, Channel::Sms);
    assert_eq!(communications[0].external_id.as_deref(), Some("ext_1"));
}

#[tokio::test]
async fn redelivered_event_executes_exactly_once() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi {{name}}".to_string(),
            },
            0,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();
    let second = harness.orchestrator.notify_event(&event).await.unwrap();

    assert_eq!(second.matched_rule_ids.len(), 1);
    assert_eq!(second.executed_immediately_count, 0);
    assert_eq!(second.scheduled_count, 0);

    assert_eq!(harness.sms.sent_count(), 1);
    let executions = harness.orchestrator.list_executions(tenant, 50).await.unwrap();
    assert_eq!(executions.len(), 1, "one execution per (rule, lead, event)");
}

#[tokio::test]
async fn delayed_rule_runs_only_once_due() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadStatusChanged {
                value: "qualified".to_string(),
            },
            RuleAction::SendSms {
                template: "Congrats {{name}}".to_string(),
            },
            10,
        )
        .await;

    let event = TriggerEvent::new(
        tenant,
        TriggerKind::LeadStatusChanged,
        lead.id,
        Some("qualified".to_string()),
    );
    let outcome = harness.orchestrator.notify_event(&event).await.unwrap();
    assert_eq!(outcome.scheduled_count, 1);
    assert_eq!(outcome.executed_immediately_count, 0);
    assert_eq!(harness.sms.sent_count(), 0);

    let now = Utc::now();
    assert_eq!(harness.orchestrator.run_due_executions(now).await.unwrap(), 0);

    let later = now + Duration::minutes(11);
    assert_eq!(
        harness.orchestrator.run_due_executions(later).await.unwrap(),
        1
    );
    assert_eq!(harness.sms.sent_count(), 1);

    // The row is done; a second pass finds nothing.
    assert_eq!(
        harness.orchestrator.run_due_executions(later).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn a_claim_abandoned_by_a_dead_worker_is_requeued_and_rerun() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi {{name}}".to_string(),
            },
            10,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    // A worker claims the due row and dies before finishing it.
    let due_at = Utc::now() + Duration::minutes(11);
    let claimed = harness
        .store
        .claim_due_executions(due_at, 100)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    // Too soon: the row is still considered in flight.
    assert_eq!(
        harness.orchestrator.run_due_executions(due_at).await.unwrap(),
        0
    );
    assert_eq!(harness.sms.sent_count(), 0);

    // Past the stale threshold the row is requeued and finally runs.
    let much_later = due_at + Duration::minutes(11);
    assert_eq!(
        harness
            .orchestrator
            .run_due_executions(much_later)
            .await
            .unwrap(),
        1
    );
    assert_eq!(harness.sms.sent_count(), 1);
}

#[tokio::test]
async fn missing_credentials_fail_the_execution_without_a_provider_call() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    // No credentials seeded.
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi {{name}}".to_string(),
            },
            0,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    assert_eq!(harness.sms.sent_count(), 0);
    let executions = harness.orchestrator.list_executions(tenant, 50).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Failed);
    assert!(executions[0].details.contains("CredentialsNotFoundError"));
}

#[tokio::test]
async fn missing_phone_fails_before_credentials_are_touched() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, None).await;
    harness.seed_credentials(tenant, "voice").await;
    harness
        .seed_rule(tenant, Trigger::LeadCreated, RuleAction::MakeCall, 0)
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    assert_eq!(harness.voice.sent_count(), 0);
    let executions = harness.orchestrator.list_executions(tenant, 50).await.unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::Failed);
    assert!(executions[0].details.contains("MissingContactInfo"));
}

#[tokio::test]
async fn provider_failure_is_recorded_not_propagated() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi".to_string(),
            },
            0,
        )
        .await;
    harness.sms.fail.store(true, Ordering::SeqCst);

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    let outcome = harness.orchestrator.notify_event(&event).await.unwrap();
    assert_eq!(outcome.executed_immediately_count, 1);

    let executions = harness.orchestrator.list_executions(tenant, 50).await.unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::Failed);
    assert!(executions[0].details.contains("ExternalServiceError"));

    // No communication row without a provider receipt.
    let communications = harness
        .orchestrator
        .list_communications(tenant, lead.id)
        .await
        .unwrap();
    assert!(communications.is_empty());
}

#[tokio::test]
async fn update_status_action_rewrites_the_lead() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, None).await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::UpdateStatus {
                value: "contacted".to_string(),
            },
            0,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    let lead = harness.orchestrator.get_lead(tenant, lead.id).await.unwrap();
    assert_eq!(lead.status, "contacted");

    let executions = harness.orchestrator.list_executions(tenant, 50).await.unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::Success);
}

#[tokio::test]
async fn email_action_writes_a_communication_without_a_gateway() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, None).await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendEmail {
                template: "Hello {{name}}".to_string(),
            },
            0,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    let communications = harness
        .orchestrator
        .list_communications(tenant, lead.id)
        .await
        .unwrap();
    assert_eq!(communications.len(), 1);
    assert_eq!(communications[0].channel, Channel::Email);
    assert_eq!(communications[0].body, "Hello Ada");
    assert!(communications[0].external_id.is_none());
}

#[tokio::test]
async fn deactivating_a_rule_cancels_its_pending_executions() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    let rule = harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi".to_string(),
            },
            30,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    harness
        .orchestrator
        .update_rule(
            tenant,
            rule.id,
            RuleUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let later = Utc::now() + Duration::minutes(31);
    assert_eq!(
        harness.orchestrator.run_due_executions(later).await.unwrap(),
        0
    );
    assert_eq!(harness.sms.sent_count(), 0);
    assert!(
        harness
            .orchestrator
            .list_executions(tenant, 50)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn a_rule_deleted_after_scheduling_never_runs() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;
    let rule = harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi".to_string(),
            },
            5,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    harness.orchestrator.notify_event(&event).await.unwrap();

    // Remove the rule behind the engine's back; the claimed row is cancelled
    // when the worker discovers the rule is gone.
    harness.store.delete_rule(tenant, rule.id).await.unwrap();

    let later = Utc::now() + Duration::minutes(6);
    assert_eq!(
        harness.orchestrator.run_due_executions(later).await.unwrap(),
        0
    );
    assert_eq!(harness.sms.sent_count(), 0);
}

#[tokio::test]
async fn one_event_fans_out_over_all_matching_rules() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let lead = harness.seed_lead(tenant, Some("+15550123")).await;
    harness.seed_credentials(tenant, "sms").await;

    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::SendSms {
                template: "Hi {{name}}".to_string(),
            },
            0,
        )
        .await;
    harness
        .seed_rule(
            tenant,
            Trigger::LeadCreated,
            RuleAction::UpdateStatus {
                value: "contacted".to_string(),
            },
            0,
        )
        .await;
    // Different trigger; must not fire.
    harness
        .seed_rule(
            tenant,
            Trigger::LeadStatusChanged {
                value: "qualified".to_string(),
            },
            RuleAction::MakeCall,
            0,
        )
        .await;

    let event = TriggerEvent::new(tenant, TriggerKind::LeadCreated, lead.id, None);
    let outcome = harness.orchestrator.notify_event(&event).await.unwrap();

    assert_eq!(outcome.matched_rule_ids.len(), 2);
    assert_eq!(outcome.executed_immediately_count, 2);
    assert_eq!(harness.voice.sent_count(), 0);
    assert_eq!(
        harness
            .orchestrator
            .list_executions(tenant, 50)
            .await
            .unwrap()
            .len(),
        2
    );
}
