// Router smoke tests: status codes only, the handlers are thin

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    routing::get,
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::AppState;
use crate::handlers;
use crate::tests::fixtures::Harness;

fn app(harness: &Harness) -> Router {
    let state = Arc::new(AppState {
        orchestrator: harness.orchestrator.clone(),
    });
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/containers", handlers::container_routes())
        .with_state(state)
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let harness = Harness::new();
    let response = app(&harness)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_scoped_routes_require_the_header() {
    let harness = Harness::new();

    let missing = app(&harness)
        .oneshot(
            Request::builder()
                .uri("/api/v1/containers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let garbled = app(&harness)
        .oneshot(
            Request::builder()
                .uri("/api/v1/containers")
                .header("X-Tenant-Id", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(garbled.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn status_for_an_unknown_tenant_is_not_found() {
    let harness = Harness::new();
    let response = app(&harness)
        .oneshot(
            Request::builder()
                .uri("/api/v1/containers")
                .header("X-Tenant-Id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_container_action_is_rejected() {
    let harness = Harness::new();
    let response = app(&harness)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/containers/reboot")
                .header("X-Tenant-Id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
