//! Treatment plan endpoints.
//!
//! Writes change the plan and usually the patient's chart too, so each runs
//! in one unit of work like a consultation does.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use dental_core::models::{NewPlan, NewStage, ProcedureRef};
use dental_core::{DentalError, Surface, TreatmentPlan, TreatmentPlanService};

use super::{stage_param, tooth_param};
use crate::error::ApiError;
use crate::extract::{ApiJson, Identity};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlan {
    pub visit_id: Option<String>,
    #[serde(flatten)]
    pub plan: NewPlan,
}

/// `POST /treatment-plan/:patient_id/start`
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Path(patient_id): Path<String>,
    ApiJson(body): ApiJson<CreatePlan>,
) -> Result<(StatusCode, Json<TreatmentPlan>), ApiError> {
    let plan = state
        .transaction(move |docs| {
            let clinic_id = match identity.clinic_id {
                Some(clinic_id) => clinic_id,
                None => docs
                    .get_patient(&patient_id)?
                    .ok_or_else(|| DentalError::not_found("Patient", patient_id.clone()))?
                    .clinic_id,
            };
            TreatmentPlanService::new(docs).create_plan(
                &patient_id,
                &clinic_id,
                &identity.doctor_id,
                body.plan,
                body.visit_id.as_deref(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// `GET /treatment-plan/:id`
pub async fn detail(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let plan = state
        .run(move |db| TreatmentPlanService::new(db.documents()).get(&plan_id))
        .await?;
    Ok(Json(plan))
}

/// `GET /treatment-plan/patient/:patient_id`
pub async fn list_for_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<TreatmentPlan>>, ApiError> {
    let plans = state
        .run(move |db| TreatmentPlanService::new(db.documents()).list_for_patient(&patient_id))
        .await?;
    Ok(Json(plans))
}

/// `POST /treatment-plan/:id/stage`
pub async fn add_stage(
    State(state): State<AppState>,
    identity: Identity,
    Path(plan_id): Path<String>,
    ApiJson(stage): ApiJson<NewStage>,
) -> Result<(StatusCode, Json<TreatmentPlan>), ApiError> {
    let plan = state
        .transaction(move |docs| {
            TreatmentPlanService::new(docs).add_stage(&plan_id, stage, &identity.doctor_id)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// `DELETE /treatment-plan/:id/stage/:stage_number`
pub async fn remove_stage(
    State(state): State<AppState>,
    _identity: Identity,
    Path((plan_id, stage_number)): Path<(String, String)>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let stage_number = stage_param(&stage_number)?;
    let plan = state
        .transaction(move |docs| {
            TreatmentPlanService::new(docs).remove_stage(&plan_id, stage_number)
        })
        .await?;
    Ok(Json(plan))
}

/// `POST /treatment-plan/:id/stage/:stage_number/start`
pub async fn start_stage(
    State(state): State<AppState>,
    _identity: Identity,
    Path((plan_id, stage_number)): Path<(String, String)>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let stage_number = stage_param(&stage_number)?;
    let plan = state
        .transaction(move |docs| {
            TreatmentPlanService::new(docs).start_stage(&plan_id, stage_number)
        })
        .await?;
    Ok(Json(plan))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStage {
    pub visit_id: Option<String>,
}

/// `POST /treatment-plan/:id/stage/:stage_number/complete`
pub async fn complete_stage(
    State(state): State<AppState>,
    identity: Identity,
    Path((plan_id, stage_number)): Path<(String, String)>,
    body: Option<ApiJson<CompleteStage>>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let stage_number = stage_param(&stage_number)?;
    let visit_id = body.and_then(|ApiJson(b)| b.visit_id);

    let plan = state
        .transaction(move |docs| {
            let plans = TreatmentPlanService::new(docs);
            let update = plans.update_stage_completion(
                &plan_id,
                stage_number,
                visit_id.as_deref(),
                &identity.doctor_id,
            )?;
            plans.mirror_into_chart(&update, &identity.doctor_id, visit_id.as_deref())?;
            Ok(update.plan)
        })
        .await?;
    Ok(Json(plan))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteProcedures {
    pub procedures: Vec<ProcedureRef>,
    pub visit_id: Option<String>,
}

/// `POST /treatment-plan/:id/procedures/complete`
pub async fn complete_procedures(
    State(state): State<AppState>,
    identity: Identity,
    Path(plan_id): Path<String>,
    ApiJson(body): ApiJson<CompleteProcedures>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let plan = state
        .transaction(move |docs| {
            let plans = TreatmentPlanService::new(docs);
            let update = plans.update_specific_procedures(
                &plan_id,
                &body.procedures,
                body.visit_id.as_deref(),
                &identity.doctor_id,
            )?;
            plans.mirror_into_chart(&update, &identity.doctor_id, body.visit_id.as_deref())?;
            Ok(update.plan)
        })
        .await?;
    Ok(Json(plan))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveProcedure {
    #[serde(alias = "procedureName")]
    pub name: String,
    pub surface: Surface,
}

/// `DELETE /treatment-plan/:id/procedure/:tooth_number`
pub async fn remove_procedure(
    State(state): State<AppState>,
    _identity: Identity,
    Path((plan_id, tooth_number)): Path<(String, String)>,
    ApiJson(body): ApiJson<RemoveProcedure>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let tooth_number = tooth_param(&tooth_number)?;
    let plan = state
        .transaction(move |docs| {
            TreatmentPlanService::new(docs).remove_procedure(
                &plan_id,
                tooth_number,
                &body.name,
                body.surface,
            )
        })
        .await?;
    Ok(Json(plan))
}

/// `POST /treatment-plan/:id/finish`
pub async fn finish(
    State(state): State<AppState>,
    identity: Identity,
    Path(plan_id): Path<String>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let update = state
        .transaction(move |docs| {
            TreatmentPlanService::new(docs).finish(&plan_id, &identity.doctor_id)
        })
        .await?;
    Ok(Json(update.plan))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPlan {
    pub reason: Option<String>,
}

/// `POST /treatment-plan/:id/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    identity: Identity,
    Path(plan_id): Path<String>,
    body: Option<ApiJson<CancelPlan>>,
) -> Result<Json<TreatmentPlan>, ApiError> {
    let reason = body
        .and_then(|ApiJson(b)| b.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let plan = state
        .transaction(move |docs| {
            TreatmentPlanService::new(docs).cancel(&plan_id, reason, &identity.doctor_id)
        })
        .await?;
    Ok(Json(plan))
}
