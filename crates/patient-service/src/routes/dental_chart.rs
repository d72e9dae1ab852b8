//! Dental chart endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use dental_core::models::ProcedureInput;
use dental_core::{ChartStore, Surface, SurfaceConflict, ToothNumber, ToothRecord};

use super::tooth_param;
use crate::error::ApiError;
use crate::extract::{ApiJson, Identity};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub patient_id: String,
    pub teeth: Vec<ToothRecord>,
}

/// `GET /dental-chart/:patient_id`
pub async fn chart(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<ChartResponse>, ApiError> {
    let response = state
        .run(move |db| {
            let chart = ChartStore::new(db.documents()).chart(&patient_id)?;
            Ok(ChartResponse {
                patient_id,
                teeth: chart.into_teeth(),
            })
        })
        .await?;
    Ok(Json(response))
}

/// `GET /dental-chart/:patient_id/tooth/:tooth_number`
pub async fn tooth(
    State(state): State<AppState>,
    Path((patient_id, tooth_number)): Path<(String, String)>,
) -> Result<Json<ToothRecord>, ApiError> {
    let tooth_number = tooth_param(&tooth_number)?;
    let record = state
        .run(move |db| ChartStore::new(db.documents()).tooth(&patient_id, tooth_number))
        .await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictQuery {
    pub tooth_number: ToothNumber,
    pub surface: Surface,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResponse {
    pub has_conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<SurfaceConflict>,
}

/// `POST /dental-chart/:patient_id/check-conflict`
pub async fn check_conflict(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    ApiJson(query): ApiJson<ConflictQuery>,
) -> Result<Json<ConflictResponse>, ApiError> {
    let conflict = state
        .run(move |db| {
            ChartStore::new(db.documents()).check_conflict(
                &patient_id,
                query.tooth_number,
                query.surface,
            )
        })
        .await?;
    Ok(Json(ConflictResponse {
        has_conflict: conflict.is_some(),
        conflict,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProcedure {
    pub tooth_number: ToothNumber,
    pub visit_id: Option<String>,
    #[serde(flatten)]
    pub procedure: ProcedureInput,
}

/// `POST /dental-chart/:patient_id/procedure`
pub async fn add_procedure(
    State(state): State<AppState>,
    identity: Identity,
    Path(patient_id): Path<String>,
    ApiJson(body): ApiJson<AddProcedure>,
) -> Result<(StatusCode, Json<ToothRecord>), ApiError> {
    let record = state
        .run(move |db| {
            ChartStore::new(db.documents()).add_procedure(
                &patient_id,
                body.tooth_number,
                body.procedure,
                &identity.doctor_id,
                body.visit_id.as_deref(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
