use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("No credits available for student {student_id} in subject {subject_id}")]
    NoCreditsAvailable { student_id: Uuid, subject_id: Uuid },

    #[error("Payment {0} has already been credited")]
    DuplicateCreditGrant(Uuid),

    #[error("Payment {0} has already been reversed")]
    DuplicateReversal(Uuid),

    #[error("Enrollment {0} has no unreleased reservation")]
    UnpairedRelease(Uuid),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Something went wrong, please try again later".to_string(),
                )
            }
            ApiError::NoCreditsAvailable { .. } => (
                StatusCode::PAYMENT_REQUIRED,
                "NO_CREDITS_AVAILABLE",
                "You have no credits for this subject".to_string(),
            ),
            ApiError::DuplicateCreditGrant(_) => (
                StatusCode::CONFLICT,
                "DUPLICATE_CREDIT_GRANT",
                self.to_string(),
            ),
            ApiError::DuplicateReversal(_) => {
                (StatusCode::CONFLICT, "DUPLICATE_REVERSAL", self.to_string())
            }
            ApiError::UnpairedRelease(_) => {
                (StatusCode::CONFLICT, "UNPAIRED_RELEASE", self.to_string())
            }
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(ref msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Something went wrong, please try again later".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;
