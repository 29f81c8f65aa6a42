// Deployment pipeline behavior

use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tenantflow_shared::{AgentStatus, ContainerStatus, DeploymentStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Store;
use crate::tests::fixtures::Harness;

#[tokio::test]
async fn unknown_template_leaves_no_trace() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    let err = harness
        .orchestrator
        .request_deployment(tenant, Uuid::new_v4(), "front-desk", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let logs = harness
        .orchestrator
        .list_deployment_logs(tenant, 50)
        .await
        .unwrap();
    assert!(logs.is_empty(), "no log row for an unresolved template");
}

#[tokio::test]
async fn successful_deployment_activates_the_agent_and_logs_it() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template = harness
        .seed_template(json!({"greeting": "Hello", "voice": "alloy"}))
        .await;

    let outcome = harness
        .orchestrator
        .request_deployment(tenant, template.id, "front-desk", &json!({"voice": "echo"}))
        .await
        .unwrap();

    assert_eq!(outcome.agent.status, AgentStatus::Active);
    assert_eq!(outcome.agent.workflow_ref.as_deref(), Some("wf_1"));
    // Overrides won key-by-key.
    assert_eq!(outcome.agent.configuration["voice"], "echo");
    assert_eq!(outcome.agent.configuration["greeting"], "Hello");

    assert_eq!(outcome.log.status, DeploymentStatus::Success);
    assert!(outcome.log.container_id.is_some());
    assert_eq!(outcome.log.metadata["workflow_ref"], "wf_1");

    let container = harness.orchestrator.container_status(tenant).await.unwrap();
    assert_eq!(container.status, ContainerStatus::Running);
}

#[tokio::test]
async fn runtime_rejection_is_a_well_formed_failed_outcome() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template = harness.seed_template(json!({})).await;

    harness.runtime.fail_push.store(true, Ordering::SeqCst);
    let outcome = harness
        .orchestrator
        .request_deployment(tenant, template.id, "front-desk", &json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.agent.status, AgentStatus::Failed);
    assert_eq!(outcome.log.status, DeploymentStatus::Failed);
    assert!(
        outcome.log.container_id.is_some(),
        "the failed log names the container it burned"
    );
    let error = outcome.log.metadata["error"].as_str().unwrap();
    assert!(error.contains("ExternalServiceError"));

    // The log row is queryable afterwards.
    let logs = harness
        .orchestrator
        .list_deployment_logs(tenant, 50)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn slow_push_times_out_and_fails_the_container() {
    let harness = Harness::with_deploy_timeout(Duration::from_millis(50));
    let tenant = Uuid::new_v4();
    let template = harness.seed_template(json!({})).await;

    *harness.runtime.push_delay.lock().unwrap() = Some(Duration::from_millis(500));

    let outcome = harness
        .orchestrator
        .request_deployment(tenant, template.id, "front-desk", &json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.agent.status, AgentStatus::Failed);
    assert_eq!(outcome.log.status, DeploymentStatus::Failed);
    assert!(outcome.log.container_id.is_some());
    let error = outcome.log.metadata["error"].as_str().unwrap();
    assert!(error.contains("TimeoutError"));

    // The abandoned container was marked failed, not left in deploying.
    assert!(
        harness
            .store
            .current_container(tenant)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn every_attempt_gets_its_own_agent_row() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();
    let template = harness.seed_template(json!({})).await;

    harness.runtime.fail_push.store(true, Ordering::SeqCst);
    let failed = harness
        .orchestrator
        .request_deployment(tenant, template.id, "front-desk", &json!({}))
        .await
        .unwrap();

    harness.runtime.fail_push.store(false, Ordering::SeqCst);
    let succeeded = harness
        .orchestrator
        .request_deployment(tenant, template.id, "front-desk", &json!({}))
        .await
        .unwrap();

    assert_ne!(failed.agent.id, succeeded.agent.id);
    let logs = harness
        .orchestrator
        .list_deployment_logs(tenant, 50)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
}
