use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    booking::{Enrollment, PaymentStatus},
    common::SuccessResponse,
    ledger::{LedgerEntry, LedgerOutcome, SubjectBalance},
};

/// Normalized "payment confirmed" webhook payload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmedRequest {
    pub payment_id: Uuid,
    pub student_id: Uuid,
    /// Omitted for "any subject" packages
    pub subject_id: Option<Uuid>,
    #[validate(range(min = 1, max = 500))]
    pub session_count: i32,
}

/// Normalized "payment canceled/refunded" webhook payload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReversedRequest {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub student_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminAdjustRequest {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    #[validate(range(min = -1000, max = 1000))]
    pub delta: i32,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceData {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub balance: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBalancesData {
    pub student_id: Uuid,
    pub balances: Vec<SubjectBalance>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHistoryData {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub entries: Vec<LedgerEntry>,
}

pub type BalanceResponse = SuccessResponse<BalanceData>;
pub type StudentBalancesResponse = SuccessResponse<StudentBalancesData>;
pub type LedgerHistoryResponse = SuccessResponse<LedgerHistoryData>;
pub type LedgerOutcomeResponse = SuccessResponse<LedgerOutcome>;
pub type EnrollmentResponse = SuccessResponse<Enrollment>;
