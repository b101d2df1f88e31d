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
        requests::{
            AdminAdjustRequest, BalanceData, BalanceResponse, LedgerHistoryData,
            LedgerHistoryResponse, LedgerOutcomeResponse, StudentBalancesData,
            StudentBalancesResponse,
        },
    },
};

/// POST /api/v1/admin/credits/adjust
#[instrument(skip(state, request), fields(student_id = %request.student_id, subject_id = %request.subject_id))]
pub async fn admin_adjust(
    State(state): State<AppState>,
    Json(request): Json<AdminAdjustRequest>,
) -> Result<Json<LedgerOutcomeResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let outcome = state
        .credits_service
        .admin_adjust(
            request.student_id,
            request.subject_id,
            request.delta,
            request.note,
        )
        .await?;

    Ok(Json(SuccessResponse::new(outcome)))
}

/// GET /api/v1/students/{id}/balances
#[instrument(skip(state))]
pub async fn get_student_balances(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentBalancesResponse>> {
    let balances = state
        .balance_resolver
        .get_balances_for_student(student_id)
        .await?;

    Ok(Json(SuccessResponse::new(StudentBalancesData {
        student_id,
        balances,
    })))
}

/// GET /api/v1/students/{id}/subjects/{subject_id}/balance
#[instrument(skip(state))]
pub async fn get_balance(
    State(state): State<AppState>,
    Path((student_id, subject_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BalanceResponse>> {
    let balance = state
        .balance_resolver
        .get_balance(student_id, subject_id)
        .await?;

    Ok(Json(SuccessResponse::new(BalanceData {
        student_id,
        subject_id,
        balance,
    })))
}

/// GET /api/v1/students/{id}/subjects/{subject_id}/ledger
#[instrument(skip(state))]
pub async fn get_ledger_history(
    State(state): State<AppState>,
    Path((student_id, subject_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LedgerHistoryResponse>> {
    let entries = state
        .credits_service
        .ledger_history(student_id, subject_id)
        .await?;

    Ok(Json(SuccessResponse::new(LedgerHistoryData {
        student_id,
        subject_id,
        entries,
    })))
}
