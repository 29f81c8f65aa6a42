use axum::{Router, extract::State, response::Json, routing::post};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tenantflow_shared::{TriggerEvent, TriggerKind};
use uuid::Uuid;

use super::TenantId;
use crate::AppState;
use crate::automations::EventOutcome;
use crate::error::ApiResult;

/// Callers may supply `event_id` so a redelivered event is deduplicated;
/// when absent one is generated and the delivery counts as fresh.
#[derive(Deserialize)]
pub struct EventRequest {
    pub event_id: Option<Uuid>,
    pub kind: TriggerKind,
    pub lead_id: Uuid,
    pub value: Option<String>,
}

pub fn event_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(notify_event))
}

async fn notify_event(
    State(state): State<Arc<AppState>>,
    TenantId(tenant_id): TenantId,
    Json(request): Json<EventRequest>,
) -> ApiResult<Json<EventOutcome>> {
    let event = TriggerEvent {
        event_id: request.event_id.unwrap_or_else(Uuid::new_v4),
        tenant_id,
        kind: request.kind,
        lead_id: request.lead_id,
        value: request.value,
        occurred_at: Utc::now(),
    };

    let outcome = state.orchestrator.notify_event(&event).await?;
    Ok(Json(outcome))
}
