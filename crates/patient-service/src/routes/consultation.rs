//! `POST /consultation/:appointment_id`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use dental_core::{ConsultationCoordinator, ConsultationOutcome, ConsultationRequest};

use crate::error::ApiError;
use crate::extract::{ApiJson, Identity};
use crate::state::AppState;

pub async fn record(
    State(state): State<AppState>,
    identity: Identity,
    Path(appointment_id): Path<String>,
    ApiJson(request): ApiJson<ConsultationRequest>,
) -> Result<(StatusCode, Json<ConsultationOutcome>), ApiError> {
    let fees = Arc::clone(&state.fees);
    let directory = Arc::clone(&state.directory);
    let notifications = Arc::clone(&state.notifications);

    let outcome = state
        .run(move |db| {
            ConsultationCoordinator::new(fees.as_ref(), directory.as_ref(), notifications.as_ref())
                .consult(db, &appointment_id, &identity.doctor_id, request)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
