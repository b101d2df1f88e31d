//! Transactional storage seam for the credit engine.
//!
//! Every mutation runs against a [`StoreTxn`] obtained from
//! [`CreditStore::begin`]. Reads through a transaction see its own
//! uncommitted writes; nothing is visible to other transactions until
//! [`StoreTxn::commit`]. Dropping a transaction without committing rolls it
//! back.
//!
//! `lock_*` methods take the row lock that serializes concurrent writers to
//! the same (student, subject) balance or enrollment. Writers that lock both
//! payment rows and a balance row take the payment rows first.

pub mod memory;
pub mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        booking::{Enrollment, Payment, TutoringSession},
        ledger::{BalanceRow, CreditKey, LedgerEntry, NewLedgerEntry},
    },
};

#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>>;
}

/// Balance and ledger primitives
#[async_trait]
pub trait LedgerTxn: Send {
    /// Read the balance row for `key` without locking it
    async fn read_balance(&mut self, key: CreditKey) -> Result<Option<BalanceRow>>;

    /// Read the balance row for `key`, locking it until the transaction ends
    async fn lock_balance(&mut self, key: CreditKey) -> Result<Option<BalanceRow>>;

    /// Lock the balance row for `key`, creating a zero row stamped `now` if
    /// the pair has never been touched
    async fn lock_or_init_balance(&mut self, key: CreditKey, now: OffsetDateTime)
        -> Result<BalanceRow>;

    /// Insert or overwrite the balance row for `key`
    async fn write_balance(
        &mut self,
        key: CreditKey,
        balance: i32,
        updated_at: OffsetDateTime,
    ) -> Result<BalanceRow>;

    /// Every balance row of a student, locked
    async fn lock_student_balances(&mut self, student_id: Uuid) -> Result<Vec<BalanceRow>>;

    /// Zero the listed subjects of a student in a single statement
    async fn reset_balances(
        &mut self,
        student_id: Uuid,
        subject_ids: &[Uuid],
        reset_at: OffsetDateTime,
    ) -> Result<u64>;

    /// Append a ledger entry.
    ///
    /// Returns `None` when the (payment, reason) or (enrollment, reason)
    /// uniqueness rule rejects the row; nothing is written in that case.
    async fn insert_ledger_entry(
        &mut self,
        entry: NewLedgerEntry,
        created_at: OffsetDateTime,
    ) -> Result<Option<LedgerEntry>>;

    async fn payment_entries(&mut self, payment_id: Uuid) -> Result<Vec<LedgerEntry>>;

    async fn enrollment_entries(&mut self, enrollment_id: Uuid) -> Result<Vec<LedgerEntry>>;

    /// Ledger history of one pair, oldest first
    async fn pair_entries(&mut self, key: CreditKey) -> Result<Vec<LedgerEntry>>;
}

/// Booking and payment rows the coordinator reads or touches
#[async_trait]
pub trait BookingTxn: Send {
    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<TutoringSession>>;

    async fn find_active_enrollment(
        &mut self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Enrollment>>;

    async fn lock_enrollment(&mut self, enrollment_id: Uuid) -> Result<Option<Enrollment>>;

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>>;

    /// Insert the payment, or overwrite its status if it is already known
    async fn upsert_payment(&mut self, payment: &Payment) -> Result<Payment>;

    /// Confirmed "any subject" payments of a student, oldest first, locked
    async fn lock_open_generic_payments(&mut self, student_id: Uuid) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait StoreTxn: LedgerTxn + BookingTxn {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
