use axum::{extract::State, Json};
use tracing::instrument;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::{
        common::SuccessResponse,
        requests::{PaymentConfirmedRequest, PaymentReversedRequest},
    },
    services::{PaymentConfirmed, PaymentCreditOutcome, PaymentReversalOutcome, PaymentReversed},
};

/// POST /api/v1/payments/confirmed
#[instrument(skip(state, request), fields(payment_id = %request.payment_id))]
pub async fn payment_confirmed(
    State(state): State<AppState>,
    Json(request): Json<PaymentConfirmedRequest>,
) -> Result<Json<SuccessResponse<PaymentCreditOutcome>>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let outcome = state
        .payment_events
        .payment_confirmed(PaymentConfirmed {
            payment_id: request.payment_id,
            student_id: request.student_id,
            subject_id: request.subject_id,
            session_count: request.session_count,
        })
        .await?;

    Ok(Json(SuccessResponse::new(outcome)))
}

/// POST /api/v1/payments/reversed
#[instrument(skip(state, request), fields(payment_id = %request.payment_id))]
pub async fn payment_reversed(
    State(state): State<AppState>,
    Json(request): Json<PaymentReversedRequest>,
) -> Result<Json<SuccessResponse<PaymentReversalOutcome>>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let outcome = state
        .payment_events
        .payment_reversed(PaymentReversed {
            payment_id: request.payment_id,
            status: request.status,
        })
        .await?;

    Ok(Json(SuccessResponse::new(outcome)))
}
