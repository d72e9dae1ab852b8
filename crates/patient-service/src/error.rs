//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dental_core::{DbError, DentalError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing identity header: {0}")]
    Unauthorized(&'static str),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Dental(#[from] DentalError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Dental(err.into())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        match self {
            ApiError::Unauthorized(header) => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                format!("{header} header is required"),
                None,
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                detail.clone(),
                None,
            ),
            ApiError::Dental(err) => dental_parts(err),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL",
        "An internal error occurred".to_string(),
        None,
    )
}

type ErrorParts = (StatusCode, &'static str, String, Option<serde_json::Value>);

fn dental_parts(err: &DentalError) -> ErrorParts {
    let message = err.to_string();
    match err {
        DentalError::Validation { field, .. } => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            message,
            Some(serde_json::json!({ "field": field })),
        ),
        DentalError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
        DentalError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN", message, None),
        DentalError::SurfaceConflict(conflict) => (
            StatusCode::CONFLICT,
            "SURFACE_ALREADY_TREATED",
            conflict.suggestion.clone(),
            serde_json::to_value(conflict.as_ref()).ok(),
        ),
        DentalError::InvalidState(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_STATE",
            message,
            None,
        ),
        DentalError::Database(DbError::WriteConflict { .. }) => (
            StatusCode::CONFLICT,
            "WRITE_CONFLICT",
            "The record changed while this request was running; retry".to_string(),
            None,
        ),
        DentalError::Database(DbError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", message, None)
        }
        DentalError::Database(_) | DentalError::Json(_) => {
            tracing::error!(error = %err, "Storage failure");
            internal()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
