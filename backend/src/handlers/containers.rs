use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tenantflow_shared::{Container, ContainerEvent};

use super::TenantId;
use crate::AppState;
use crate::error::{ApiResult, AppError};
use crate::orchestrator::ContainerAction;

#[derive(Deserialize)]
pub struct EventQuery {
    pub limit: Option<i64>,
}

pub fn container_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(container_status))
        .route("/events", get(list_events))
        .route("/:action", post(container_action))
}

async fn container_status(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
) -> ApiResult<Json<Container>> {
    let container = state.orchestrator.container_status(tenant_id).await?;
    Ok(Json(container))
}

async fn container_action(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(action): Path<String>,
) -> ApiResult<Json<Container>> {
    let action = ContainerAction::parse(&action)
        .ok_or_else(|| AppError::Validation(format!("unknown container action '{}'", action)))?;

    let container = state.orchestrator.container_action(tenant_id, action).await?;
    Ok(Json(container))
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(params): Query<EventQuery>,
) -> ApiResult<Json<Vec<ContainerEvent>>> {
    let events = state
        .orchestrator
        .list_container_events(tenant_id, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(events))
}
