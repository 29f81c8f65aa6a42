use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tenantflow_shared::WorkflowTemplate;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct TemplateCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub configuration: serde_json::Value,
}

pub fn template_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_template))
        .route("/:id", get(get_template))
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TemplateCreate>,
) -> ApiResult<Json<WorkflowTemplate>> {
    let template = state
        .orchestrator
        .create_template(&request.name, request.description, request.configuration)
        .await?;
    Ok(Json(template))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowTemplate>> {
    let template = state.orchestrator.get_template(id).await?;
    Ok(Json(template))
}
