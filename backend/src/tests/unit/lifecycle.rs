// Container lifecycle behavior

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::atomic::Ordering;
use tenantflow_shared::ContainerStatus;
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Store;
use crate::tests::fixtures::Harness;

fn workflow() -> serde_json::Value {
    json!({"template": "reception"})
}

#[tokio::test]
async fn concurrent_ensure_creates_exactly_one_container() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let containers = harness.containers.clone();
        handles.push(tokio::spawn(
            async move { containers.ensure_container(tenant).await },
        ));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller saw the same container");
    assert_eq!(harness.runtime.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deploy_walks_provisioning_deploying_running() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    let (container, workflow_ref) = harness.containers.deploy(tenant, &workflow()).await.unwrap();
    assert_eq!(container.status, ContainerStatus::Running);
    assert_eq!(workflow_ref, "wf_1");
    assert!(container.deployed_at.is_some());

    let events = harness.store.list_container_events(tenant, 50).await.unwrap();
    let mut types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    types.reverse(); // listing is newest first
    assert_eq!(
        types,
        vec!["provisioning_started", "deploy_started", "deploy_succeeded"]
    );
}

#[tokio::test]
async fn deploy_while_running_is_an_invalid_transition() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    harness.containers.deploy(tenant, &workflow()).await.unwrap();
    let err = harness
        .containers
        .deploy(tenant, &workflow())
        .await
        .unwrap_err();

    match err {
        AppError::InvalidStateTransition { from, action } => {
            assert_eq!(from, ContainerStatus::Running);
            assert_eq!(action, "deploy");
        }
        other => panic!("expected InvalidStateTransition, got {}", other),
    }
}

#[tokio::test]
async fn stop_then_redeploy_reuses_the_container() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    let (first, _) = harness.containers.deploy(tenant, &workflow()).await.unwrap();
    let stopped = harness.containers.stop(tenant).await.unwrap();
    assert_eq!(stopped.status, ContainerStatus::Stopped);
    assert!(stopped.stopped_at.is_some());
    assert_eq!(harness.runtime.terminates.load(Ordering::SeqCst), 1);

    let (second, _) = harness.containers.deploy(tenant, &workflow()).await.unwrap();
    assert_eq!(second.id, first.id, "redeploy reuses the stopped container");
    assert_eq!(second.status, ContainerStatus::Running);
    assert_eq!(harness.runtime.creates.load(Ordering::SeqCst), 1);
    assert_eq!(harness.runtime.pushes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_requires_a_running_container() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    // No container at all.
    assert!(matches!(
        harness.containers.stop(tenant).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    // Stopped is not stoppable again.
    harness.containers.deploy(tenant, &workflow()).await.unwrap();
    harness.containers.stop(tenant).await.unwrap();
    assert!(matches!(
        harness.containers.stop(tenant).await.unwrap_err(),
        AppError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn restart_cycles_the_runtime_and_returns_to_running() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    harness.containers.deploy(tenant, &workflow()).await.unwrap();
    let restarted = harness.containers.restart(tenant).await.unwrap();

    assert_eq!(restarted.status, ContainerStatus::Running);
    assert_eq!(harness.runtime.terminates.load(Ordering::SeqCst), 1);
    assert_eq!(harness.runtime.creates.load(Ordering::SeqCst), 2);

    // Restart is only legal from running.
    harness.containers.stop(tenant).await.unwrap();
    assert!(matches!(
        harness.containers.restart(tenant).await.unwrap_err(),
        AppError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn restart_repushes_the_deployed_workflow() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    harness.containers.deploy(tenant, &workflow()).await.unwrap();
    harness.containers.restart(tenant).await.unwrap();

    // The recreated instance starts empty; without a second push the
    // tenant's workload would not actually be running on it.
    assert_eq!(harness.runtime.pushes.load(Ordering::SeqCst), 2);

    let events = harness.store.list_container_events(tenant, 50).await.unwrap();
    let restarted = events
        .iter()
        .find(|e| e.event_type == "restarted")
        .expect("restarted event");
    assert_eq!(restarted.metadata["workflow_ref"], "wf_2");
}

#[tokio::test]
async fn failed_repush_on_restart_fails_the_container() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    harness.containers.deploy(tenant, &workflow()).await.unwrap();
    harness.runtime.fail_push.store(true, Ordering::SeqCst);

    let err = harness.containers.restart(tenant).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService { .. }));
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
async fn push_failure_fails_the_container_and_the_next_deploy_starts_fresh() {
    let harness = Harness::new();
    let tenant = Uuid::new_v4();

    harness.runtime.fail_push.store(true, Ordering::SeqCst);
    let err = harness
        .containers
        .deploy(tenant, &workflow())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalService { .. }));

    // Failed is terminal; the tenant has no live container anymore.
    assert!(
        harness
            .store
            .current_container(tenant)
            .await
            .unwrap()
            .is_none()
    );

    harness.runtime.fail_push.store(false, Ordering::SeqCst);
    let (container, _) = harness.containers.deploy(tenant, &workflow()).await.unwrap();
    assert_eq!(container.status, ContainerStatus::Running);
    assert_eq!(
        harness.runtime.creates.load(Ordering::SeqCst),
        2,
        "a fresh container was provisioned"
    );
}

#[tokio::test]
async fn sweep_fails_containers_stuck_in_transitional_states() {
    let harness = Harness::new();
    let stuck_tenant = Uuid::new_v4();
    let fresh_tenant = Uuid::new_v4();

    // Both tenants sit in provisioning; only one has been there too long.
    harness.containers.ensure_container(stuck_tenant).await.unwrap();
    harness.containers.ensure_container(fresh_tenant).await.unwrap();

    let mut stuck = harness
        .store
        .current_container(stuck_tenant)
        .await
        .unwrap()
        .unwrap();
    stuck.updated_at = Utc::now() - ChronoDuration::hours(1);
    harness.store.update_container(&stuck).await.unwrap();

    let swept = harness.containers.sweep_stuck(Utc::now()).await.unwrap();
    assert_eq!(swept, 1);

    assert!(
        harness
            .store
            .current_container(stuck_tenant)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(
        harness
            .store
            .current_container(fresh_tenant)
            .await
            .unwrap()
            .unwrap()
            .status,
        ContainerStatus::Provisioning
    );

    let events = harness
        .store
        .list_container_events(stuck_tenant, 50)
        .await
        .unwrap();
    assert!(events.iter().any(|e| e.event_type == "swept_failed"));
}
