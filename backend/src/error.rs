//! Standardized error handling for the Tenantflow API
//!
//! This module provides a consistent error response format across all
//! endpoints and the single error taxonomy used by the orchestration core.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tenantflow_shared::ContainerStatus;

/// Standard API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code (e.g., "NOT_FOUND", "INVALID_STATE_TRANSITION")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Application error type that can be converted to HTTP responses.
#[derive(Debug, Clone)]
pub enum AppError {
    // Resource errors
    NotFound(String),

    // Lifecycle errors
    InvalidStateTransition {
        from: ContainerStatus,
        action: String,
    },

    // Input errors
    Validation(String),

    // Automation execution errors
    MissingContactInfo(String),
    CredentialsNotFound {
        tenant_id: uuid::Uuid,
        service: String,
    },
    // Idempotency key collision; treated as a no-op success by callers and
    // never surfaced through the API as a failure.
    DuplicateExecution,

    // External collaborator errors
    ExternalService {
        service: String,
        message: String,
    },
    Timeout(String),

    // Server errors
    Database(String),
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MissingContactInfo(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CredentialsNotFound { .. } => StatusCode::NOT_FOUND,
            Self::DuplicateExecution => StatusCode::OK,
            Self::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the stable error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MissingContactInfo(_) => "MISSING_CONTACT_INFO",
            Self::CredentialsNotFound { .. } => "CREDENTIALS_NOT_FOUND",
            Self::DuplicateExecution => "DUPLICATE_EXECUTION",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(resource) => format!("{} not found", resource),
            Self::InvalidStateTransition { from, action } => format!(
                "cannot perform '{}' while container is '{}'",
                action,
                from.as_str()
            ),
            Self::Validation(msg) => msg.clone(),
            Self::MissingContactInfo(msg) => msg.clone(),
            Self::CredentialsNotFound { tenant_id, service } => format!(
                "no '{}' credentials stored for tenant {}",
                service, tenant_id
            ),
            Self::DuplicateExecution => "execution already recorded for this trigger".to_string(),
            Self::ExternalService { service, message } => {
                tracing::error!("External service error ({}): {}", service, message);
                format!("external service '{}' failed: {}", service, message)
            }
            Self::Timeout(msg) => msg.clone(),
            Self::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                "a database error occurred".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "an internal error occurred".to_string()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalService { service, message } => {
                write!(f, "ExternalServiceError: {}: {}", service, message)
            }
            Self::CredentialsNotFound { tenant_id, service } => write!(
                f,
                "CredentialsNotFoundError: no '{}' credentials for tenant {}",
                service, tenant_id
            ),
            Self::MissingContactInfo(msg) => write!(f, "MissingContactInfo: {}", msg),
            Self::Timeout(msg) => write!(f, "TimeoutError: {}", msg),
            Self::Database(msg) => write!(f, "DatabaseError: {}", msg),
            _ => write!(f, "{}: {}", self.error_code(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = ApiError::new(self.error_code(), self.message());
        (status, Json(error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource".to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {}", err))
    }
}

/// Result type alias for handlers and services
pub type ApiResult<T> = Result<T, AppError>;
