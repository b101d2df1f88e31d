use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{credit_ledger::CreditLedger, idempotency};
use crate::{
    clock::Clock,
    error::{ApiError, Result},
    models::{
        booking::{Payment, PaymentStatus},
        ledger::CreditKey,
    },
    store::{CreditStore, StoreTxn},
};

/// Normalized "payment confirmed" event
#[derive(Debug, Clone)]
pub struct PaymentConfirmed {
    pub payment_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub session_count: i32,
}

/// Normalized "payment canceled/refunded" event
#[derive(Debug, Clone)]
pub struct PaymentReversed {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentCreditOutcome {
    #[serde(rename_all = "camelCase")]
    Credited { balance: i32, entry_id: Uuid },
    /// A retry of a payment whose credits were already granted
    AlreadyCredited,
    /// "Any subject" package, credited on the student's first booking
    Deferred,
    /// The payment was canceled or refunded before this confirmation arrived
    Voided,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentReversalOutcome {
    #[serde(rename_all = "camelCase")]
    Reversed { balance: i32, entry_id: Uuid },
    AlreadyReversed,
    /// The payment never produced credits
    NothingToReverse,
}

/// Webhook-side collaborator: turns payment events into guarded grants and reversals
pub struct PaymentEventService {
    store: Arc<dyn CreditStore>,
    ledger: CreditLedger,
    clock: Arc<dyn Clock>,
}

impl PaymentEventService {
    pub fn new(store: Arc<dyn CreditStore>, ledger: CreditLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ledger,
            clock,
        }
    }

    /// Record a confirmed payment and credit its sessions once.
    #[instrument(skip(self))]
    pub async fn payment_confirmed(&self, event: PaymentConfirmed) -> Result<PaymentCreditOutcome> {
        if event.session_count <= 0 {
            return Err(ApiError::BadRequest(format!(
                "Session count must be positive, got {}",
                event.session_count
            )));
        }

        let payment_id = event.payment_id;
        let mut txn = self.store.begin().await?;

        match self.confirm_in_txn(txn.as_mut(), event).await {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(ApiError::DuplicateCreditGrant(_)) => {
                // A concurrent delivery of the same webhook won the insert
                txn.rollback().await?;
                info!(payment_id = %payment_id, "Payment credited by a concurrent delivery");
                Ok(PaymentCreditOutcome::AlreadyCredited)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    /// Record a canceled or refunded payment and claw back its grant once.
    #[instrument(skip(self))]
    pub async fn payment_reversed(&self, event: PaymentReversed) -> Result<PaymentReversalOutcome> {
        if event.status == PaymentStatus::Confirmed {
            return Err(ApiError::BadRequest(
                "Reversal status must be CANCELED or REFUNDED".to_string(),
            ));
        }

        let payment_id = event.payment_id;
        let mut txn = self.store.begin().await?;

        match self.reverse_in_txn(txn.as_mut(), event).await {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(ApiError::DuplicateReversal(_)) => {
                txn.rollback().await?;
                info!(payment_id = %payment_id, "Payment reversed by a concurrent delivery");
                Ok(PaymentReversalOutcome::AlreadyReversed)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn confirm_in_txn(
        &self,
        txn: &mut dyn StoreTxn,
        event: PaymentConfirmed,
    ) -> Result<PaymentCreditOutcome> {
        let now = self.clock.now();

        if let Some(known) = txn.lock_payment(event.payment_id).await? {
            if known.status != PaymentStatus::Confirmed {
                warn!(
                    payment_id = %event.payment_id,
                    status = ?known.status,
                    "Ignoring confirmation of a reversed payment"
                );
                return Ok(PaymentCreditOutcome::Voided);
            }
        }

        let payment = txn
            .upsert_payment(&Payment {
                id: event.payment_id,
                student_id: event.student_id,
                subject_id: event.subject_id,
                session_count: event.session_count,
                status: PaymentStatus::Confirmed,
                confirmed_at: now,
                updated_at: now,
            })
            .await?;

        if idempotency::find_payment_grant(&mut *txn, payment.id)
            .await?
            .is_some()
        {
            info!(payment_id = %payment.id, "Payment already credited, skipping");
            return Ok(PaymentCreditOutcome::AlreadyCredited);
        }

        let Some(subject_id) = payment.subject_id else {
            info!(
                payment_id = %payment.id,
                student_id = %payment.student_id,
                "Any-subject package recorded, credits deferred to first booking"
            );
            return Ok(PaymentCreditOutcome::Deferred);
        };

        let key = CreditKey::new(payment.student_id, subject_id);
        let outcome = self
            .ledger
            .grant(&mut *txn, key, payment.session_count, payment.id)
            .await?;

        Ok(PaymentCreditOutcome::Credited {
            balance: outcome.balance,
            entry_id: outcome.entry.id,
        })
    }

    async fn reverse_in_txn(
        &self,
        txn: &mut dyn StoreTxn,
        event: PaymentReversed,
    ) -> Result<PaymentReversalOutcome> {
        let now = self.clock.now();

        if let Some(mut payment) = txn.lock_payment(event.payment_id).await? {
            payment.status = event.status;
            payment.updated_at = now;
            txn.upsert_payment(&payment).await?;
        }

        let Some(grant) = idempotency::find_payment_grant(&mut *txn, event.payment_id).await?
        else {
            info!(payment_id = %event.payment_id, "Payment was never credited, nothing to reverse");
            return Ok(PaymentReversalOutcome::NothingToReverse);
        };

        if idempotency::is_payment_reversed(&mut *txn, event.payment_id).await? {
            info!(payment_id = %event.payment_id, "Payment already reversed, skipping");
            return Ok(PaymentReversalOutcome::AlreadyReversed);
        }

        let note = format!("Payment {} {:?}", event.payment_id, event.status).to_lowercase();
        let outcome = self
            .ledger
            .adjust(
                &mut *txn,
                grant.key,
                -grant.delta,
                Some(event.payment_id),
                Some(note),
            )
            .await?;

        Ok(PaymentReversalOutcome::Reversed {
            balance: outcome.balance,
            entry_id: outcome.entry.id,
        })
    }
}
