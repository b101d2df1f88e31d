//! Guards over ledger history that keep webhook retries and repeated
//! cancellations from moving credits twice.
//!
//! They run inside the caller's transaction; the unique indexes on
//! (payment_id, reason) and (enrollment_id, reason) remain the final word
//! when two transactions race past a guard.

use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    models::{
        booking::Payment,
        ledger::{CreditKey, CreditReason, LedgerEntry},
    },
    store::LedgerTxn,
};

/// The PAYMENT_CREDIT entry written for `payment_id`, if the payment was ever credited
pub async fn find_payment_grant<T>(txn: &mut T, payment_id: Uuid) -> Result<Option<LedgerEntry>>
where
    T: LedgerTxn + ?Sized,
{
    Ok(txn
        .payment_entries(payment_id)
        .await?
        .into_iter()
        .find(|entry| entry.reason == CreditReason::PaymentCredit))
}

/// Whether the grant for `payment_id` has already been reversed
pub async fn is_payment_reversed<T>(txn: &mut T, payment_id: Uuid) -> Result<bool>
where
    T: LedgerTxn + ?Sized,
{
    Ok(txn
        .payment_entries(payment_id)
        .await?
        .iter()
        .any(|entry| entry.reason == CreditReason::AdminAdjust))
}

/// Oldest payment among `candidates` that has not been credited yet
pub async fn first_unallocated<T>(txn: &mut T, candidates: Vec<Payment>) -> Result<Option<Payment>>
where
    T: LedgerTxn + ?Sized,
{
    for payment in candidates {
        if find_payment_grant(txn, payment.id).await?.is_none() {
            return Ok(Some(payment));
        }
    }
    Ok(None)
}

/// A release must match exactly one reserve of the same enrollment on the
/// same pair, and that reserve must not have been released already.
pub async fn ensure_release_is_paired<T>(
    txn: &mut T,
    key: CreditKey,
    enrollment_id: Uuid,
) -> Result<()>
where
    T: LedgerTxn + ?Sized,
{
    let entries = txn.enrollment_entries(enrollment_id).await?;

    let reserves = entries
        .iter()
        .filter(|e| e.reason == CreditReason::EnrollReserve && e.key == key)
        .count();
    let released = entries
        .iter()
        .any(|e| e.reason == CreditReason::EnrollRelease);

    if reserves != 1 || released {
        return Err(ApiError::UnpairedRelease(enrollment_id));
    }

    Ok(())
}
