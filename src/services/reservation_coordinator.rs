use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{credit_ledger::CreditLedger, idempotency};
use crate::{
    clock::Clock,
    error::{ApiError, Result},
    models::{
        booking::{Enrollment, EnrollmentStatus},
        ledger::{CreditKey, LedgerOutcome},
    },
    store::{CreditStore, StoreTxn},
};

/// Keeps enrollment state and credit state in step.
///
/// Booking reserves a credit or fails; cancelling releases the credit only if
/// one is actually held and the session is still ahead. The cancellation
/// window itself is the booking workflow's business.
pub struct ReservationCoordinator {
    store: Arc<dyn CreditStore>,
    ledger: CreditLedger,
    clock: Arc<dyn Clock>,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn CreditStore>, ledger: CreditLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ledger,
            clock,
        }
    }

    /// Enroll a student into a session, reserving one credit of the session's subject.
    ///
    /// On `NoCreditsAvailable` nothing is written: no enrollment, no
    /// allocation of an "any subject" package.
    #[instrument(skip(self))]
    pub async fn enroll(&self, student_id: Uuid, session_id: Uuid) -> Result<Enrollment> {
        let mut txn = self.store.begin().await?;

        match self.enroll_in_txn(txn.as_mut(), student_id, session_id).await {
            Ok(enrollment) => {
                txn.commit().await?;
                info!(
                    student_id = %student_id,
                    session_id = %session_id,
                    enrollment_id = %enrollment.id,
                    "Enrollment created with reserved credit"
                );
                Ok(enrollment)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    /// Cancel an enrollment, refunding its credit when eligible
    #[instrument(skip(self))]
    pub async fn cancel(&self, enrollment_id: Uuid) -> Result<Enrollment> {
        let mut txn = self.store.begin().await?;

        match self.cancel_in_txn(txn.as_mut(), enrollment_id).await {
            Ok(enrollment) => {
                txn.commit().await?;
                Ok(enrollment)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn enroll_in_txn(
        &self,
        txn: &mut dyn StoreTxn,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Enrollment> {
        let now = self.clock.now();

        let session = txn
            .find_session(session_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", session_id)))?;

        if session.has_started(now) {
            return Err(ApiError::Conflict(format!(
                "Session {} has already started",
                session_id
            )));
        }

        if txn
            .find_active_enrollment(student_id, session_id)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(format!(
                "Student {} is already enrolled in session {}",
                student_id, session_id
            )));
        }

        // Payment rows are locked before the balance row, same as the webhook paths
        let key = CreditKey::new(student_id, session.subject_id);
        if self.ledger.usable_balance(&mut *txn, key).await? <= 0 {
            self.allocate_generic_package(&mut *txn, key).await?;
        }

        let enrollment_id = Uuid::new_v4();
        self.ledger.reserve(&mut *txn, key, enrollment_id).await?;

        let enrollment = Enrollment {
            id: enrollment_id,
            session_id,
            student_id,
            status: EnrollmentStatus::Active,
            credits_reserved: 1,
            created_at: now,
            cancelled_at: None,
        };
        txn.insert_enrollment(&enrollment).await?;

        Ok(enrollment)
    }

    /// Credit the oldest unallocated "any subject" package to `key`'s subject
    async fn allocate_generic_package(
        &self,
        txn: &mut dyn StoreTxn,
        key: CreditKey,
    ) -> Result<Option<LedgerOutcome>> {
        let candidates = txn.lock_open_generic_payments(key.student_id).await?;
        let Some(payment) = idempotency::first_unallocated(&mut *txn, candidates).await? else {
            return Ok(None);
        };

        let outcome = self
            .ledger
            .grant(&mut *txn, key, payment.session_count, payment.id)
            .await?;

        info!(
            student_id = %key.student_id,
            subject_id = %key.subject_id,
            payment_id = %payment.id,
            amount = payment.session_count,
            "Allocated any-subject package to first booked subject"
        );

        Ok(Some(outcome))
    }

    async fn cancel_in_txn(&self, txn: &mut dyn StoreTxn, enrollment_id: Uuid) -> Result<Enrollment> {
        let mut enrollment = txn.lock_enrollment(enrollment_id).await?.ok_or_else(|| {
            ApiError::NotFound(format!("Enrollment {} not found", enrollment_id))
        })?;

        if enrollment.is_cancelled() {
            return Ok(enrollment);
        }

        let session = txn
            .find_session(enrollment.session_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Session {} not found", enrollment.session_id))
            })?;

        let now = self.clock.now();
        if enrollment.holds_credit() && !session.has_started(now) {
            let key = CreditKey::new(enrollment.student_id, session.subject_id);
            self.ledger.release(&mut *txn, key, enrollment.id).await?;
            enrollment.credits_reserved = 0;
        }

        enrollment.status = EnrollmentStatus::Cancelled;
        enrollment.cancelled_at = Some(now);
        txn.save_enrollment(&enrollment).await?;

        info!(
            enrollment_id = %enrollment.id,
            student_id = %enrollment.student_id,
            refunded = !enrollment.holds_credit(),
            "Enrollment cancelled"
        );

        Ok(enrollment)
    }
}
