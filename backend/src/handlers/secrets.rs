use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::put,
};
use serde_json::json;
use std::sync::Arc;

use super::TenantId;
use crate::AppState;
use crate::channels::ChannelCredentials;
use crate::error::ApiResult;

pub fn secret_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:service", put(store_credentials).delete(delete_credentials))
}

async fn store_credentials(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(service): Path<String>,
    Json(credentials): Json<ChannelCredentials>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .orchestrator
        .store_credentials(tenant_id, &service, credentials)
        .await?;
    Ok(Json(json!({"stored": service})))
}

async fn delete_credentials(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Path(service): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .orchestrator
        .delete_credentials(tenant_id, &service)
        .await?;
    Ok(Json(json!({"deleted": service})))
}
