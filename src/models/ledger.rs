//! Domain view of balances and ledger entries.
//!
//! The store implementations convert their rows into these types so the
//! engine never depends on a particular persistence backend.
use entity::{credit_balances, credit_ledger_entries};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use entity::sea_orm_active_enums::CreditReason;

/// Identifies the balance a movement applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditKey {
    pub student_id: Uuid,
    pub subject_id: Uuid,
}

impl CreditKey {
    pub fn new(student_id: Uuid, subject_id: Uuid) -> Self {
        Self {
            student_id,
            subject_id,
        }
    }
}

/// Stored balance row for a (student, subject) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRow {
    pub key: CreditKey,
    pub balance: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}

impl From<credit_balances::Model> for BalanceRow {
    fn from(model: credit_balances::Model) -> Self {
        Self {
            key: CreditKey::new(model.student_id, model.subject_id),
            balance: model.balance,
            updated_at: model.updated_at,
        }
    }
}

/// A ledger row about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub key: CreditKey,
    pub delta: i32,
    pub reason: CreditReason,
    pub enrollment_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub note: Option<String>,
}

impl NewLedgerEntry {
    pub fn new(key: CreditKey, delta: i32, reason: CreditReason) -> Self {
        Self {
            key,
            delta,
            reason,
            enrollment_id: None,
            payment_id: None,
            note: None,
        }
    }

    pub fn with_enrollment(mut self, enrollment_id: Uuid) -> Self {
        self.enrollment_id = Some(enrollment_id);
        self
    }

    pub fn with_payment(mut self, payment_id: Option<Uuid>) -> Self {
        self.payment_id = payment_id;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Materialize the row with its identity and timestamp
    pub fn into_entry(self, id: Uuid, created_at: time::OffsetDateTime) -> LedgerEntry {
        LedgerEntry {
            id,
            key: self.key,
            delta: self.delta,
            reason: self.reason,
            enrollment_id: self.enrollment_id,
            payment_id: self.payment_id,
            note: self.note,
            created_at,
        }
    }
}

/// Immutable record of a single credit movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub key: CreditKey,
    pub delta: i32,
    pub reason: CreditReason,
    pub enrollment_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

impl From<credit_ledger_entries::Model> for LedgerEntry {
    fn from(model: credit_ledger_entries::Model) -> Self {
        Self {
            id: model.id,
            key: CreditKey::new(model.student_id, model.subject_id),
            delta: model.delta,
            reason: model.reason,
            enrollment_id: model.enrollment_id,
            payment_id: model.payment_id,
            note: model.note,
            created_at: model.created_at,
        }
    }
}

/// Result of every ledger mutation: the new balance and the entry that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOutcome {
    pub balance: i32,
    pub entry: LedgerEntry,
}

/// Normalized balance for one subject, as shown on dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectBalance {
    pub subject_id: Uuid,
    pub balance: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}
