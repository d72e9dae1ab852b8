//! HTTP routes.
//!
//! Path params use `:param` syntax (matchit 0.7 / axum 0.7). Handlers never
//! touch SQLite directly; they hand a closure to [`AppState::run`].

mod appointments;
mod consultation;
mod dental_chart;
mod health;
mod patients;
mod treatment_plan;
mod visits;

use axum::routing::{delete, get, post};
use axum::Router;

use dental_core::ToothNumber;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::check))
        .route("/patients", post(patients::register))
        .route("/patients/:patient_id", get(patients::detail))
        .route("/appointments", post(appointments::book))
        .route("/appointments/:appointment_id", get(appointments::detail))
        .route("/consultation/:appointment_id", post(consultation::record))
        .route("/visits/:visit_id", get(visits::detail))
        .route("/dental-chart/:patient_id", get(dental_chart::chart))
        .route(
            "/dental-chart/:patient_id/tooth/:tooth_number",
            get(dental_chart::tooth),
        )
        .route(
            "/dental-chart/:patient_id/check-conflict",
            post(dental_chart::check_conflict),
        )
        .route(
            "/dental-chart/:patient_id/procedure",
            post(dental_chart::add_procedure),
        )
        .route(
            "/treatment-plan/patient/:patient_id",
            get(treatment_plan::list_for_patient),
        )
        // `:id` is the patient on `start` and the plan everywhere else.
        .route("/treatment-plan/:id/start", post(treatment_plan::create))
        .route("/treatment-plan/:id", get(treatment_plan::detail))
        .route("/treatment-plan/:id/stage", post(treatment_plan::add_stage))
        .route(
            "/treatment-plan/:id/stage/:stage_number",
            delete(treatment_plan::remove_stage),
        )
        .route(
            "/treatment-plan/:id/stage/:stage_number/start",
            post(treatment_plan::start_stage),
        )
        .route(
            "/treatment-plan/:id/stage/:stage_number/complete",
            post(treatment_plan::complete_stage),
        )
        .route(
            "/treatment-plan/:id/procedures/complete",
            post(treatment_plan::complete_procedures),
        )
        .route(
            "/treatment-plan/:id/procedure/:tooth_number",
            delete(treatment_plan::remove_procedure),
        )
        .route("/treatment-plan/:id/finish", post(treatment_plan::finish))
        .route("/treatment-plan/:id/cancel", post(treatment_plan::cancel))
        .with_state(state)
}

fn tooth_param(raw: &str) -> Result<ToothNumber, ApiError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("tooth number must be an integer, got {raw}")))?;
    Ok(ToothNumber::new(value)?)
}

fn stage_param(raw: &str) -> Result<u32, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::BadRequest(format!("stage number must be a positive integer, got {raw}"))
    })
}
