use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{balance_resolver::MonthlyReset, idempotency};
use crate::{
    clock::Clock,
    error::{ApiError, Result},
    models::ledger::{CreditKey, CreditReason, LedgerOutcome, NewLedgerEntry},
    store::LedgerTxn,
};

/// The only writer of credit balances and ledger entries.
///
/// Holds no connection of its own: every operation runs against the
/// transaction handed in by the caller, who decides to commit or roll back.
/// Each operation locks the pair's balance row, applies the monthly reset,
/// appends the ledger entry, then stores the new balance.
#[derive(Clone)]
pub struct CreditLedger {
    clock: Arc<dyn Clock>,
    reset: MonthlyReset,
}

impl CreditLedger {
    pub fn new(clock: Arc<dyn Clock>, reset: MonthlyReset) -> Self {
        Self { clock, reset }
    }

    /// Credit a confirmed payment's sessions.
    ///
    /// Fails with `DuplicateCreditGrant` if the payment was already credited.
    #[instrument(skip(self, txn))]
    pub async fn grant<T>(
        &self,
        txn: &mut T,
        key: CreditKey,
        session_count: i32,
        payment_id: Uuid,
    ) -> Result<LedgerOutcome>
    where
        T: LedgerTxn + ?Sized,
    {
        if session_count <= 0 {
            return Err(ApiError::BadRequest(format!(
                "Session count must be positive, got {}",
                session_count
            )));
        }

        let movement = NewLedgerEntry::new(key, session_count, CreditReason::PaymentCredit)
            .with_payment(Some(payment_id));
        let outcome = self.apply(txn, movement).await?;

        info!(
            student_id = %key.student_id,
            subject_id = %key.subject_id,
            payment_id = %payment_id,
            amount = session_count,
            balance = outcome.balance,
            "Granted payment credits"
        );

        Ok(outcome)
    }

    /// Debit one credit for a booking.
    ///
    /// Fails with `NoCreditsAvailable` when the usable balance is zero or
    /// negative. The check runs under the balance row lock.
    #[instrument(skip(self, txn))]
    pub async fn reserve<T>(
        &self,
        txn: &mut T,
        key: CreditKey,
        enrollment_id: Uuid,
    ) -> Result<LedgerOutcome>
    where
        T: LedgerTxn + ?Sized,
    {
        let movement = NewLedgerEntry::new(key, -1, CreditReason::EnrollReserve)
            .with_enrollment(enrollment_id);
        let outcome = self.apply(txn, movement).await?;

        info!(
            student_id = %key.student_id,
            subject_id = %key.subject_id,
            enrollment_id = %enrollment_id,
            balance = outcome.balance,
            "Reserved credit for enrollment"
        );

        Ok(outcome)
    }

    /// Give back the credit reserved by `enrollment_id`
    #[instrument(skip(self, txn))]
    pub async fn release<T>(
        &self,
        txn: &mut T,
        key: CreditKey,
        enrollment_id: Uuid,
    ) -> Result<LedgerOutcome>
    where
        T: LedgerTxn + ?Sized,
    {
        idempotency::ensure_release_is_paired(txn, key, enrollment_id).await?;

        let movement = NewLedgerEntry::new(key, 1, CreditReason::EnrollRelease)
            .with_enrollment(enrollment_id);
        let outcome = self.apply(txn, movement).await?;

        info!(
            student_id = %key.student_id,
            subject_id = %key.subject_id,
            enrollment_id = %enrollment_id,
            balance = outcome.balance,
            "Released reserved credit"
        );

        Ok(outcome)
    }

    /// Apply an arbitrary signed correction. The balance may go negative.
    ///
    /// With a `payment_id` this is the reversal of that payment's grant and
    /// may happen only once (`DuplicateReversal`).
    #[instrument(skip(self, txn))]
    pub async fn adjust<T>(
        &self,
        txn: &mut T,
        key: CreditKey,
        delta: i32,
        payment_id: Option<Uuid>,
        note: Option<String>,
    ) -> Result<LedgerOutcome>
    where
        T: LedgerTxn + ?Sized,
    {
        if delta == 0 {
            return Err(ApiError::BadRequest(
                "Adjustment delta must not be zero".to_string(),
            ));
        }

        let movement = NewLedgerEntry::new(key, delta, CreditReason::AdminAdjust)
            .with_payment(payment_id)
            .with_note(note);
        let outcome = self.apply(txn, movement).await?;

        info!(
            student_id = %key.student_id,
            subject_id = %key.subject_id,
            delta,
            payment_id = ?payment_id,
            balance = outcome.balance,
            "Adjusted credit balance"
        );

        Ok(outcome)
    }

    /// Month-normalized balance, read without taking the row lock.
    ///
    /// Only a hint: `reserve` re-checks under the lock.
    pub async fn usable_balance<T>(&self, txn: &mut T, key: CreditKey) -> Result<i32>
    where
        T: LedgerTxn + ?Sized,
    {
        let now = self.clock.now();
        Ok(txn
            .read_balance(key)
            .await?
            .map(|row| self.reset.usable(&row, now))
            .unwrap_or(0))
    }

    async fn apply<T>(&self, txn: &mut T, movement: NewLedgerEntry) -> Result<LedgerOutcome>
    where
        T: LedgerTxn + ?Sized,
    {
        let now = self.clock.now();
        let key = movement.key;
        let row = txn.lock_or_init_balance(key, now).await?;

        let current = if self.reset.is_stale(row.updated_at, now) {
            debug!(
                student_id = %key.student_id,
                subject_id = %key.subject_id,
                expired = row.balance,
                "Balance belongs to a previous month, resetting before mutation"
            );
            0
        } else {
            row.balance
        };

        if movement.reason == CreditReason::EnrollReserve && current <= 0 {
            return Err(ApiError::NoCreditsAvailable {
                student_id: key.student_id,
                subject_id: key.subject_id,
            });
        }

        let balance = current.checked_add(movement.delta).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Credit balance out of range after applying {}",
                movement.delta
            ))
        })?;

        let duplicate = duplicate_error(&movement);
        let entry = txn
            .insert_ledger_entry(movement, now)
            .await?
            .ok_or(duplicate)?;

        txn.write_balance(key, balance, now).await?;

        Ok(LedgerOutcome { balance, entry })
    }
}

/// Error for a ledger row rejected by the uniqueness rules
fn duplicate_error(movement: &NewLedgerEntry) -> ApiError {
    match movement.reason {
        CreditReason::PaymentCredit => {
            ApiError::DuplicateCreditGrant(movement.payment_id.unwrap_or_default())
        }
        CreditReason::AdminAdjust => {
            ApiError::DuplicateReversal(movement.payment_id.unwrap_or_default())
        }
        CreditReason::EnrollReserve => ApiError::Conflict(format!(
            "Enrollment {} already holds a reserved credit",
            movement.enrollment_id.unwrap_or_default()
        )),
        CreditReason::EnrollRelease => {
            ApiError::UnpairedRelease(movement.enrollment_id.unwrap_or_default())
        }
    }
}
