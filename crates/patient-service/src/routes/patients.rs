//! Patient registration and lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use dental_core::{DentalError, Patient};

use crate::error::ApiError;
use crate::extract::{ApiJson, Identity};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPatient {
    pub patient_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// `POST /patients`
pub async fn register(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<RegisterPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let clinic_id = identity.clinic()?.to_string();
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(DentalError::validation("name", "must not be empty").into());
    }
    let patient_id = body
        .patient_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut patient = Patient::new(patient_id, clinic_id, name);
    patient.phone = body.phone.filter(|p| !p.trim().is_empty());
    patient.email = body.email.filter(|e| !e.trim().is_empty());

    let patient = state
        .run(move |db| {
            let docs = db.documents();
            if docs.patient_exists(&patient.patient_id)? {
                return Err(DentalError::validation("patientId", "already registered"));
            }
            docs.insert_patient(&patient)?;
            Ok(patient)
        })
        .await?;

    tracing::info!(patient_id = %patient.patient_id, "Patient registered");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /patients/:patient_id`
pub async fn detail(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let patient = state
        .run(move |db| {
            db.documents()
                .get_patient(&patient_id)?
                .ok_or_else(|| DentalError::not_found("Patient", patient_id))
        })
        .await?;
    Ok(Json(patient))
}
