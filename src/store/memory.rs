//! In-memory store with the same transactional contract as [`SeaOrmStore`].
//!
//! A transaction holds the store's single lock from `begin` until it is
//! committed or dropped, so transactions are fully serialized. Writes go to a
//! private copy of the state that replaces the shared state on commit.
//!
//! [`SeaOrmStore`]: super::SeaOrmStore

use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{BookingTxn, CreditStore, LedgerTxn, StoreTxn};
use crate::{
    error::{ApiError, Result},
    models::{
        booking::{Enrollment, EnrollmentStatus, Payment, PaymentStatus, TutoringSession},
        ledger::{BalanceRow, CreditKey, LedgerEntry, NewLedgerEntry},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    balances: BTreeMap<CreditKey, BalanceRow>,
    entries: Vec<LedgerEntry>,
    sessions: HashMap<Uuid, TutoringSession>,
    enrollments: HashMap<Uuid, Enrollment>,
    payments: HashMap<Uuid, Payment>,
}

impl MemoryState {
    fn violates_uniqueness(&self, entry: &NewLedgerEntry) -> bool {
        self.entries.iter().any(|existing| {
            existing.reason == entry.reason
                && ((entry.payment_id.is_some() && existing.payment_id == entry.payment_id)
                    || (entry.enrollment_id.is_some()
                        && existing.enrollment_id == entry.enrollment_id))
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bookable session (owned by the booking subsystem in production)
    pub async fn add_session(&self, session: TutoringSession) {
        self.state.lock().await.sessions.insert(session.id, session);
    }

    /// Register an enrollment as-is, bypassing the coordinator
    pub async fn add_enrollment(&self, enrollment: Enrollment) {
        self.state
            .lock()
            .await
            .enrollments
            .insert(enrollment.id, enrollment);
    }

    /// Overwrite a balance row directly, bypassing the ledger
    pub async fn set_balance(&self, key: CreditKey, balance: i32, updated_at: OffsetDateTime) {
        self.state.lock().await.balances.insert(
            key,
            BalanceRow {
                key,
                balance,
                updated_at,
            },
        );
    }

    pub async fn stored_balance(&self, key: CreditKey) -> Option<BalanceRow> {
        self.state.lock().await.balances.get(&key).cloned()
    }

    /// Every committed ledger entry in insertion order
    pub async fn ledger(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.clone()
    }

    pub async fn enrollment(&self, enrollment_id: Uuid) -> Option<Enrollment> {
        self.state.lock().await.enrollments.get(&enrollment_id).cloned()
    }

    pub async fn payment(&self, payment_id: Uuid) -> Option<Payment> {
        self.state.lock().await.payments.get(&payment_id).cloned()
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>> {
        let committed = Arc::clone(&self.state).lock_owned().await;
        let working = committed.clone();
        Ok(Box::new(MemoryTxn { committed, working }))
    }
}

pub struct MemoryTxn {
    committed: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerTxn for MemoryTxn {
    async fn read_balance(&mut self, key: CreditKey) -> Result<Option<BalanceRow>> {
        Ok(self.working.balances.get(&key).cloned())
    }

    async fn lock_balance(&mut self, key: CreditKey) -> Result<Option<BalanceRow>> {
        Ok(self.working.balances.get(&key).cloned())
    }

    async fn lock_or_init_balance(
        &mut self,
        key: CreditKey,
        now: OffsetDateTime,
    ) -> Result<BalanceRow> {
        let row = self.working.balances.entry(key).or_insert(BalanceRow {
            key,
            balance: 0,
            updated_at: now,
        });
        Ok(row.clone())
    }

    async fn write_balance(
        &mut self,
        key: CreditKey,
        balance: i32,
        updated_at: OffsetDateTime,
    ) -> Result<BalanceRow> {
        let row = BalanceRow {
            key,
            balance,
            updated_at,
        };
        self.working.balances.insert(key, row.clone());
        Ok(row)
    }

    async fn lock_student_balances(&mut self, student_id: Uuid) -> Result<Vec<BalanceRow>> {
        let mut rows: Vec<BalanceRow> = self
            .working
            .balances
            .values()
            .filter(|row| row.key.student_id == student_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.key.subject_id);
        Ok(rows)
    }

    async fn reset_balances(
        &mut self,
        student_id: Uuid,
        subject_ids: &[Uuid],
        reset_at: OffsetDateTime,
    ) -> Result<u64> {
        let mut affected = 0;
        for subject_id in subject_ids {
            let key = CreditKey::new(student_id, *subject_id);
            if let Some(row) = self.working.balances.get_mut(&key) {
                row.balance = 0;
                row.updated_at = reset_at;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn insert_ledger_entry(
        &mut self,
        entry: NewLedgerEntry,
        created_at: OffsetDateTime,
    ) -> Result<Option<LedgerEntry>> {
        if self.working.violates_uniqueness(&entry) {
            return Ok(None);
        }

        let entry = entry.into_entry(Uuid::new_v4(), created_at);
        self.working.entries.push(entry.clone());
        Ok(Some(entry))
    }

    async fn payment_entries(&mut self, payment_id: Uuid) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|entry| entry.payment_id == Some(payment_id))
            .cloned()
            .collect())
    }

    async fn enrollment_entries(&mut self, enrollment_id: Uuid) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|entry| entry.enrollment_id == Some(enrollment_id))
            .cloned()
            .collect())
    }

    async fn pair_entries(&mut self, key: CreditKey) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|entry| entry.key == key)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingTxn for MemoryTxn {
    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<TutoringSession>> {
        Ok(self.working.sessions.get(&session_id).cloned())
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .values()
            .find(|e| {
                e.student_id == student_id
                    && e.session_id == session_id
                    && e.status == EnrollmentStatus::Active
            })
            .cloned())
    }

    async fn lock_enrollment(&mut self, enrollment_id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self.working.enrollments.get(&enrollment_id).cloned())
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        if self
            .find_active_enrollment(enrollment.student_id, enrollment.session_id)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(format!(
                "Student {} is already enrolled in session {}",
                enrollment.student_id, enrollment.session_id
            )));
        }

        self.working
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        match self.working.enrollments.get_mut(&enrollment.id) {
            Some(existing) => {
                existing.status = enrollment.status;
                existing.credits_reserved = enrollment.credits_reserved;
                existing.cancelled_at = enrollment.cancelled_at;
                Ok(())
            }
            None => Err(ApiError::NotFound(format!(
                "Enrollment {} not found",
                enrollment.id
            ))),
        }
    }

    async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(&payment_id).cloned())
    }

    async fn upsert_payment(&mut self, payment: &Payment) -> Result<Payment> {
        let stored = self
            .working
            .payments
            .entry(payment.id)
            .and_modify(|existing| {
                existing.status = payment.status;
                existing.updated_at = payment.updated_at;
            })
            .or_insert_with(|| payment.clone());
        Ok(stored.clone())
    }

    async fn lock_open_generic_payments(&mut self, student_id: Uuid) -> Result<Vec<Payment>> {
        let mut open: Vec<Payment> = self
            .working
            .payments
            .values()
            .filter(|p| {
                p.student_id == student_id
                    && p.subject_id.is_none()
                    && p.status == PaymentStatus::Confirmed
            })
            .cloned()
            .collect();
        open.sort_by_key(|p| (p.confirmed_at, p.id));
        Ok(open)
    }
}

#[async_trait]
impl StoreTxn for MemoryTxn {
    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTxn {
            mut committed,
            working,
        } = *self;
        *committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
