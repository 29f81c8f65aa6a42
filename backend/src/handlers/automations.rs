use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tenantflow_shared::{AutomationExecution, AutomationRule, RuleAction, Trigger};
use uuid::Uuid;

use super::TenantId;
use crate::AppState;
use crate::error::ApiResult;
use crate::orchestrator::RuleUpdate;

#[derive(Deserialize)]
pub struct RuleCreate {
    pub trigger: Trigger,
    pub action: RuleAction,
    #[serde(default)]
    pub delay_minutes: i64,
}

#[derive(Deserialize)]
pub struct RulePatch {
    pub trigger: Option<Trigger>,
    pub action: Option<RuleAction>,
    pub delay_minutes: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct ExecutionQuery {
    pub limit: Option<i64>,
}

pub fn automation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/executions", get(list_executions))
        .route("/:id", get(get_rule).put(update_rule).delete(delete_rule))
}

async fn list_rules(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
) -> ApiResult<Json<Vec<AutomationRule>>> {
    let rules = state.orchestrator.list_rules(tenant_id).await?;
    Ok(Json(rules))
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Json(request): Json<RuleCreate>,
) -> ApiResult<Json<AutomationRule>> {
    let rule = state
        .orchestrator
        .create_rule(
            tenant_id,
            request.trigger,
            request.action,
            request.delay_minutes,
        )
        .await?;
    Ok(Json(rule))
}

async fn get_rule(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AutomationRule>> {
    let rule = state.orchestrator.get_rule(tenant_id, id).await?;
    Ok(Json(rule))
}

async fn update_rule(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
    Json(patch): Json<RulePatch>,
) -> ApiResult<Json<AutomationRule>> {
    let rule = state
        .orchestrator
        .update_rule(
            tenant_id,
            id,
            RuleUpdate {
                trigger: patch.trigger,
                action: patch.action,
                delay_minutes: patch.delay_minutes,
                is_active: patch.is_active,
            },
        )
        .await?;
    Ok(Json(rule))
}

async fn delete_rule(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.orchestrator.delete_rule(tenant_id, id).await?;
    Ok(Json(json!({"deleted": id})))
}

async fn list_executions(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Query(params): Query<ExecutionQuery>,
) -> ApiResult<Json<Vec<AutomationExecution>>> {
    let executions = state
        .orchestrator
        .list_executions(tenant_id, params.limit.unwrap_or(50))
        .await?;
    Ok(Json(executions))
}
