use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

pub mod automations;
pub mod containers;
pub mod deployments;
pub mod events;
pub mod leads;
pub mod secrets;
pub mod templates;

pub use automations::automation_routes;
pub use containers::container_routes;
pub use deployments::deployment_routes;
pub use events::event_routes;
pub use leads::lead_routes;
pub use secrets::secret_routes;
pub use templates::template_routes;

/// Tenant identity, taken from the `X-Tenant-Id` header on every
/// tenant-scoped route. Authentication is out of scope; the header is
/// trusted as-is.
pub struct TenantId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation("missing X-Tenant-Id header".to_string()))?;

        let tenant_id = Uuid::parse_str(value)
            .map_err(|_| AppError::Validation("X-Tenant-Id must be a UUID".to_string()))?;
        Ok(TenantId(tenant_id))
    }
}

pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({"status": "healthy", "service": "tenantflow-api"})),
    )
}
