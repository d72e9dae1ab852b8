use axum::extract::{Path, State};
use axum::Json;

use dental_core::{DentalError, Visit};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /visits/:visit_id`
pub async fn detail(
    State(state): State<AppState>,
    Path(visit_id): Path<String>,
) -> Result<Json<Visit>, ApiError> {
    let visit = state
        .run(move |db| {
            db.documents()
                .get_visit(&visit_id)?
                .ok_or_else(|| DentalError::not_found("Visit", visit_id))
        })
        .await?;
    Ok(Json(visit))
}
