use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tenantflow_shared::{Agent, DeploymentLog};
use uuid::Uuid;

use super::TenantId;
use crate::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct DeploymentRequest {
    pub template_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub configuration: serde_json::Value,
}

#[derive(Serialize)]
pub struct DeploymentResponse {
    pub agent: Agent,
    pub deployment_log: DeploymentLog,
}

#[derive(Deserialize)]
pub struct LogQuery {
    pub limit: Option<i64>,
}

pub fn deployment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(request_deployment))
        .route("/logs", get(list_logs))
}

async fn request_deployment(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Json(request): Json<DeploymentRequest>,
) -> ApiResult<Json<DeploymentResponse>> {
    let outcome = state
        .orchestrator
        .request_deployment(
            tenant_id,
            request.template_id,
            &request.name,
            &request.configuration,
        )
        .await?;

    Ok(Json(DeploymentResponse {
        agent: outcome.agent,
        deployment_log: outcome.log,
    }))
}

async fn list_logs(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(params): Query<LogQuery>,
) -> ApiResult<Json<Vec<DeploymentLog>>> {
    let logs = state
        .orchestrator
        .list_deployment_logs(tenant_id, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(logs))
}
