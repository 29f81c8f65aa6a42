use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tenantflow_shared::{Communication, Lead};
use uuid::Uuid;

use super::TenantId;
use crate::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct LeadCreate {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub fn lead_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_lead))
        .route("/:id", get(get_lead))
        .route("/:id/communications", get(list_communications))
}

async fn create_lead(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Json(request): Json<LeadCreate>,
) -> ApiResult<Json<Lead>> {
    let lead = state
        .orchestrator
        .create_lead(tenant_id, &request.name, request.phone, request.email)
        .await?;
    Ok(Json(lead))
}

async fn get_lead(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Lead>> {
    let lead = state.orchestrator.get_lead(tenant_id, id).await?;
    Ok(Json(lead))
}

async fn list_communications(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Communication>>> {
    let communications = state.orchestrator.list_communications(tenant_id, id).await?;
    Ok(Json(communications))
}
