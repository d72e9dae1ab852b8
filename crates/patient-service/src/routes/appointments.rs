//! Appointment booking and lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use dental_core::{Appointment, DentalError};

use crate::error::ApiError;
use crate::extract::{ApiJson, Identity};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointment {
    pub patient_id: String,
    /// Defaults to the calling doctor
    pub doctor_id: Option<String>,
    pub date: String,
    pub time: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

/// `POST /appointments`
pub async fn book(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<BookAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let clinic_id = identity.clinic()?.to_string();
    if body.date.trim().is_empty() {
        return Err(DentalError::validation("date", "must not be empty").into());
    }
    let doctor_id = body
        .doctor_id
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(identity.doctor_id);

    let mut appointment = Appointment::new(
        body.patient_id.trim().to_string(),
        doctor_id,
        clinic_id,
        body.date.trim().to_string(),
    );
    appointment.time = body.time;
    appointment.department = body.department;
    appointment.notes = body.notes;

    let appointment = state
        .run(move |db| {
            let docs = db.documents();
            if !docs.patient_exists(&appointment.patient_id)? {
                return Err(DentalError::not_found("Patient", appointment.patient_id.clone()));
            }
            docs.insert_appointment(&appointment)?;
            Ok(appointment)
        })
        .await?;

    tracing::info!(
        appointment_id = %appointment.appointment_id,
        patient_id = %appointment.patient_id,
        "Appointment booked"
    );
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `GET /appointments/:appointment_id`
pub async fn detail(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = state
        .run(move |db| {
            db.documents()
                .get_appointment(&appointment_id)?
                .ok_or_else(|| DentalError::not_found("Appointment", appointment_id))
        })
        .await?;
    Ok(Json(appointment))
}
