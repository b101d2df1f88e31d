use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::{
        common::SuccessResponse,
        requests::{EnrollRequest, EnrollmentResponse},
    },
};

/// POST /api/v1/enrollments
///
/// Reserves one credit of the session's subject; answers 402 when the student has none.
#[instrument(skip(state))]
pub async fn enroll(
    State(state): State<AppState>,
    Json(request): Json<EnrollRequest>,
) -> Result<Json<EnrollmentResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let enrollment = state
        .reservations
        .enroll(request.student_id, request.session_id)
        .await?;

    Ok(Json(SuccessResponse::new(enrollment)))
}

/// POST /api/v1/enrollments/{id}/cancel
#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> Result<Json<EnrollmentResponse>> {
    let enrollment = state.reservations.cancel(enrollment_id).await?;

    Ok(Json(SuccessResponse::new(enrollment)))
}
