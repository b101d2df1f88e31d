use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::credit_ledger::CreditLedger;
use crate::{
    error::Result,
    models::ledger::{CreditKey, LedgerEntry, LedgerOutcome},
    store::CreditStore,
};

/// Admin-facing credit operations: manual corrections and the audit trail
pub struct CreditsService {
    store: Arc<dyn CreditStore>,
    ledger: CreditLedger,
}

impl CreditsService {
    pub fn new(store: Arc<dyn CreditStore>, ledger: CreditLedger) -> Self {
        Self { store, ledger }
    }

    /// Manual correction of a balance, not tied to any payment
    #[instrument(skip(self, note))]
    pub async fn admin_adjust(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
        delta: i32,
        note: Option<String>,
    ) -> Result<LedgerOutcome> {
        let key = CreditKey::new(student_id, subject_id);
        let mut txn = self.store.begin().await?;

        match self
            .ledger
            .adjust(txn.as_mut(), key, delta, None, note)
            .await
        {
            Ok(outcome) => {
                txn.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    /// Every movement of one (student, subject) pair, oldest first
    #[instrument(skip(self))]
    pub async fn ledger_history(&self, student_id: Uuid, subject_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let mut txn = self.store.begin().await?;
        let entries = txn
            .pair_entries(CreditKey::new(student_id, subject_id))
            .await?;
        txn.rollback().await?;

        Ok(entries)
    }
}
