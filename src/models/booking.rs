//! Rows owned by the booking and payment subsystems that the credit engine reads or touches
use entity::{enrollments, payments, tutoring_sessions};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use entity::sea_orm_active_enums::{EnrollmentStatus, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutoringSession {
    pub id: Uuid,
    pub subject_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: time::OffsetDateTime,
}

impl TutoringSession {
    pub fn has_started(&self, now: time::OffsetDateTime) -> bool {
        self.starts_at <= now
    }
}

impl From<tutoring_sessions::Model> for TutoringSession {
    fn from(model: tutoring_sessions::Model) -> Self {
        Self {
            id: model.id,
            subject_id: model.subject_id,
            starts_at: model.starts_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: EnrollmentStatus,
    pub credits_reserved: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<time::OffsetDateTime>,
}

impl Enrollment {
    pub fn holds_credit(&self) -> bool {
        self.credits_reserved == 1
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EnrollmentStatus::Cancelled
    }
}

impl From<enrollments::Model> for Enrollment {
    fn from(model: enrollments::Model) -> Self {
        Self {
            id: model.id,
            session_id: model.session_id,
            student_id: model.student_id,
            status: model.status,
            credits_reserved: model.credits_reserved,
            created_at: model.created_at,
            cancelled_at: model.cancelled_at,
        }
    }
}

/// Normalized payment state as last reported by the gateway webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub student_id: Uuid,
    /// None for packages usable in any subject
    pub subject_id: Option<Uuid>,
    pub session_count: i32,
    pub status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub confirmed_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}

impl Payment {
    pub fn is_subject_agnostic(&self) -> bool {
        self.subject_id.is_none()
    }
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Self {
            id: model.id,
            student_id: model.student_id,
            subject_id: model.subject_id,
            session_count: model.session_count,
            status: model.status,
            confirmed_at: model.confirmed_at,
            updated_at: model.updated_at,
        }
    }
}
