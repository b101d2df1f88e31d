use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    clock::Clock,
    error::Result,
    models::ledger::{BalanceRow, CreditKey, SubjectBalance},
    store::CreditStore,
};

/// Calendar-month reset rule: credits do not roll over into a new month.
///
/// Months are compared in a fixed UTC offset so the boundary does not depend
/// on the host's local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyReset {
    offset: UtcOffset,
}

impl MonthlyReset {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(UtcOffset::UTC)
    }

    /// True when `updated_at` falls in a calendar month strictly before the month of `now`
    pub fn is_stale(&self, updated_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        let then = updated_at.to_offset(self.offset);
        let now = now.to_offset(self.offset);
        (then.year(), u8::from(then.month())) < (now.year(), u8::from(now.month()))
    }

    /// Balance usable at `now`, zero if the row belongs to a previous month
    pub fn usable(&self, row: &BalanceRow, now: OffsetDateTime) -> i32 {
        if self.is_stale(row.updated_at, now) {
            0
        } else {
            row.balance
        }
    }
}

impl Default for MonthlyReset {
    fn default() -> Self {
        Self::utc()
    }
}

/// Read side of the balances, applying (and persisting) the monthly reset
pub struct BalanceResolver {
    store: Arc<dyn CreditStore>,
    clock: Arc<dyn Clock>,
    reset: MonthlyReset,
}

impl BalanceResolver {
    pub fn new(store: Arc<dyn CreditStore>, clock: Arc<dyn Clock>, reset: MonthlyReset) -> Self {
        Self {
            store,
            clock,
            reset,
        }
    }

    /// Usable credits for one (student, subject) pair.
    ///
    /// No row means zero and nothing is written. A row last touched in an
    /// earlier month is zeroed in storage before zero is returned.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, student_id: Uuid, subject_id: Uuid) -> Result<i32> {
        let key = CreditKey::new(student_id, subject_id);
        let mut txn = self.store.begin().await?;

        let Some(row) = txn.lock_balance(key).await? else {
            txn.commit().await?;
            return Ok(0);
        };

        let now = self.clock.now();
        if !self.reset.is_stale(row.updated_at, now) {
            txn.commit().await?;
            return Ok(row.balance);
        }

        txn.write_balance(key, 0, now).await?;
        txn.commit().await?;

        info!(
            student_id = %student_id,
            subject_id = %subject_id,
            expired = row.balance,
            "Monthly reset applied to credit balance"
        );

        Ok(0)
    }

    /// Every balance of a student, stale rows reset in a single update
    #[instrument(skip(self))]
    pub async fn get_balances_for_student(&self, student_id: Uuid) -> Result<Vec<SubjectBalance>> {
        let mut txn = self.store.begin().await?;
        let rows = txn.lock_student_balances(student_id).await?;
        let now = self.clock.now();

        let stale: Vec<Uuid> = rows
            .iter()
            .filter(|row| self.reset.is_stale(row.updated_at, now))
            .map(|row| row.key.subject_id)
            .collect();

        if !stale.is_empty() {
            let reset = txn.reset_balances(student_id, &stale, now).await?;
            info!(
                student_id = %student_id,
                reset,
                "Monthly reset applied to stale credit balances"
            );
        }
        txn.commit().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let is_stale = stale.contains(&row.key.subject_id);
                SubjectBalance {
                    subject_id: row.key.subject_id,
                    balance: if is_stale { 0 } else { row.balance },
                    updated_at: if is_stale { now } else { row.updated_at },
                }
            })
            .collect())
    }
}
