//! Request extractors: caller identity and JSON bodies.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub const DOCTOR_HEADER: &str = "X-Doctor-Id";
pub const CLINIC_HEADER: &str = "X-Clinic-Id";

/// Caller identity, verified upstream and forwarded as headers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub doctor_id: String,
    pub clinic_id: Option<String>,
}

impl Identity {
    /// Clinic header, for operations that create clinic-scoped records.
    pub fn clinic(&self) -> Result<&str, ApiError> {
        self.clinic_id
            .as_deref()
            .ok_or(ApiError::Unauthorized(CLINIC_HEADER))
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let doctor_id = header(parts, DOCTOR_HEADER).ok_or(ApiError::Unauthorized(DOCTOR_HEADER))?;
        Ok(Identity {
            doctor_id,
            clinic_id: header(parts, CLINIC_HEADER),
        })
    }
}

/// `Json` whose rejections use the service's error body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
