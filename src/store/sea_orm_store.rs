use anyhow::anyhow;
use async_trait::async_trait;
use entity::{
    credit_balances, credit_ledger_entries, enrollments, payments,
    sea_orm_active_enums::{EnrollmentStatus, PaymentStatus},
    tutoring_sessions,
};
use sea_orm::{
    entity::*,
    query::*,
    sea_query::{Expr, OnConflict},
    DatabaseConnection, DatabaseTransaction, Select, SqlErr, TransactionTrait,
};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{BookingTxn, CreditStore, LedgerTxn, StoreTxn};
use crate::{
    error::{ApiError, Result},
    models::{
        booking::{Enrollment, Payment, TutoringSession},
        ledger::{BalanceRow, CreditKey, LedgerEntry, NewLedgerEntry},
    },
};

/// PostgreSQL-backed store. Row locks are `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CreditStore for SeaOrmStore {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SeaOrmTxn { txn }))
    }
}

pub struct SeaOrmTxn {
    txn: DatabaseTransaction,
}

impl SeaOrmTxn {
    fn balance_query(key: CreditKey) -> Select<credit_balances::Entity> {
        credit_balances::Entity::find()
            .filter(credit_balances::Column::StudentId.eq(key.student_id))
            .filter(credit_balances::Column::SubjectId.eq(key.subject_id))
    }
}

#[async_trait]
impl LedgerTxn for SeaOrmTxn {
    async fn read_balance(&mut self, key: CreditKey) -> Result<Option<BalanceRow>> {
        let row = Self::balance_query(key).one(&self.txn).await?;

        Ok(row.map(BalanceRow::from))
    }

    async fn lock_balance(&mut self, key: CreditKey) -> Result<Option<BalanceRow>> {
        let row = Self::balance_query(key)
            .lock_exclusive()
            .one(&self.txn)
            .await?;

        Ok(row.map(BalanceRow::from))
    }

    async fn lock_or_init_balance(
        &mut self,
        key: CreditKey,
        now: OffsetDateTime,
    ) -> Result<BalanceRow> {
        if let Some(row) = self.lock_balance(key).await? {
            return Ok(row);
        }

        // Insert a zero row (no-op if another transaction races) then re-lock
        let placeholder = credit_balances::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(key.student_id),
            subject_id: Set(key.subject_id),
            balance: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        credit_balances::Entity::insert(placeholder)
            .on_conflict(
                OnConflict::columns([
                    credit_balances::Column::StudentId,
                    credit_balances::Column::SubjectId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await?;

        self.lock_balance(key).await?.ok_or_else(|| {
            ApiError::Internal(anyhow!(
                "Failed to create or lock credit balance for student {} subject {}",
                key.student_id,
                key.subject_id
            ))
        })
    }

    async fn write_balance(
        &mut self,
        key: CreditKey,
        balance: i32,
        updated_at: OffsetDateTime,
    ) -> Result<BalanceRow> {
        let row = credit_balances::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(key.student_id),
            subject_id: Set(key.subject_id),
            balance: Set(balance),
            created_at: Set(updated_at),
            updated_at: Set(updated_at),
        };

        credit_balances::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    credit_balances::Column::StudentId,
                    credit_balances::Column::SubjectId,
                ])
                .update_columns([
                    credit_balances::Column::Balance,
                    credit_balances::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await?;

        Ok(BalanceRow {
            key,
            balance,
            updated_at,
        })
    }

    async fn lock_student_balances(&mut self, student_id: Uuid) -> Result<Vec<BalanceRow>> {
        let rows = credit_balances::Entity::find()
            .filter(credit_balances::Column::StudentId.eq(student_id))
            .order_by_asc(credit_balances::Column::SubjectId)
            .lock_exclusive()
            .all(&self.txn)
            .await?;

        Ok(rows.into_iter().map(BalanceRow::from).collect())
    }

    async fn reset_balances(
        &mut self,
        student_id: Uuid,
        subject_ids: &[Uuid],
        reset_at: OffsetDateTime,
    ) -> Result<u64> {
        if subject_ids.is_empty() {
            return Ok(0);
        }

        let result = credit_balances::Entity::update_many()
            .col_expr(credit_balances::Column::Balance, Expr::value(0))
            .col_expr(credit_balances::Column::UpdatedAt, Expr::value(reset_at))
            .filter(credit_balances::Column::StudentId.eq(student_id))
            .filter(credit_balances::Column::SubjectId.is_in(subject_ids.iter().copied()))
            .exec(&self.txn)
            .await?;

        Ok(result.rows_affected)
    }

    async fn insert_ledger_entry(
        &mut self,
        entry: NewLedgerEntry,
        created_at: OffsetDateTime,
    ) -> Result<Option<LedgerEntry>> {
        let id = Uuid::new_v4();
        let row = credit_ledger_entries::ActiveModel {
            id: Set(id),
            student_id: Set(entry.key.student_id),
            subject_id: Set(entry.key.subject_id),
            delta: Set(entry.delta),
            reason: Set(entry.reason),
            enrollment_id: Set(entry.enrollment_id),
            payment_id: Set(entry.payment_id),
            note: Set(entry.note.clone()),
            created_at: Set(created_at),
        };

        // Uniqueness is enforced by the (payment_id, reason) and (enrollment_id, reason) indexes
        let conflict_target = if entry.payment_id.is_some() {
            Some(credit_ledger_entries::Column::PaymentId)
        } else if entry.enrollment_id.is_some() {
            Some(credit_ledger_entries::Column::EnrollmentId)
        } else {
            None
        };

        let insert = credit_ledger_entries::Entity::insert(row);
        let inserted = match conflict_target {
            Some(column) => {
                insert
                    .on_conflict(
                        OnConflict::columns([column, credit_ledger_entries::Column::Reason])
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(&self.txn)
                    .await?
            }
            None => insert.exec_without_returning(&self.txn).await?,
        };

        if inserted == 0 {
            return Ok(None);
        }

        Ok(Some(entry.into_entry(id, created_at)))
    }

    async fn payment_entries(&mut self, payment_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let rows = credit_ledger_entries::Entity::find()
            .filter(credit_ledger_entries::Column::PaymentId.eq(payment_id))
            .order_by_asc(credit_ledger_entries::Column::CreatedAt)
            .all(&self.txn)
            .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    async fn enrollment_entries(&mut self, enrollment_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let rows = credit_ledger_entries::Entity::find()
            .filter(credit_ledger_entries::Column::EnrollmentId.eq(enrollment_id))
            .order_by_asc(credit_ledger_entries::Column::CreatedAt)
            .all(&self.txn)
            .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    async fn pair_entries(&mut self, key: CreditKey) -> Result<Vec<LedgerEntry>> {
        let rows = credit_ledger_entries::Entity::find()
            .filter(credit_ledger_entries::Column::StudentId.eq(key.student_id))
            .filter(credit_ledger_entries::Column::SubjectId.eq(key.subject_id))
            .order_by_asc(credit_ledger_entries::Column::CreatedAt)
            .order_by_asc(credit_ledger_entries::Column::Id)
            .all(&self.txn)
            .await?;

        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }
}

#[async_trait]
impl BookingTxn for SeaOrmTxn {
    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<TutoringSession>> {
        let session = tutoring_sessions::Entity::find_by_id(session_id)
            .one(&self.txn)
            .await?;

        Ok(session.map(TutoringSession::from))
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let enrollment = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .filter(enrollments::Column::SessionId.eq(session_id))
            .filter(enrollments::Column::Status.eq(EnrollmentStatus::Active))
            .one(&self.txn)
            .await?;

        Ok(enrollment.map(Enrollment::from))
    }

    async fn lock_enrollment(&mut self, enrollment_id: Uuid) -> Result<Option<Enrollment>> {
        let enrollment = enrollments::Entity::find_by_id(enrollment_id)
            .lock_exclusive()
            .one(&self.txn)
            .await?;

        Ok(enrollment.map(Enrollment::from))
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        let row = enrollments::ActiveModel {
            id: Set(enrollment.id),
            session_id: Set(enrollment.session_id),
            student_id: Set(enrollment.student_id),
            status: Set(enrollment.status),
            credits_reserved: Set(enrollment.credits_reserved),
            created_at: Set(enrollment.created_at),
            cancelled_at: Set(enrollment.cancelled_at),
        };

        // Map uniqueness violations (concurrent double booking) to a client-friendly error
        match enrollments::Entity::insert(row)
            .exec_without_returning(&self.txn)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(ApiError::Conflict(format!(
                    "Student {} is already enrolled in session {}",
                    enrollment.student_id, enrollment.session_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        let row = enrollments::ActiveModel {
            id: Unchanged(enrollment.id),
            status: Set(enrollment.status),
            credits_reserved: Set(enrollment.credits_reserved),
            cancelled_at: Set(enrollment.cancelled_at),
            ..Default::default()
        };

        row.update(&self.txn).await?;
        Ok(())
    }

    async fn lock_payment(&mut self, payment_id: Uuid) -> Result<Option<Payment>> {
        let payment = payments::Entity::find_by_id(payment_id)
            .lock_exclusive()
            .one(&self.txn)
            .await?;

        Ok(payment.map(Payment::from))
    }

    async fn upsert_payment(&mut self, payment: &Payment) -> Result<Payment> {
        let row = payments::ActiveModel {
            id: Set(payment.id),
            student_id: Set(payment.student_id),
            subject_id: Set(payment.subject_id),
            session_count: Set(payment.session_count),
            status: Set(payment.status),
            confirmed_at: Set(payment.confirmed_at),
            updated_at: Set(payment.updated_at),
        };

        payments::Entity::insert(row)
            .on_conflict(
                OnConflict::column(payments::Column::Id)
                    .update_columns([payments::Column::Status, payments::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.txn)
            .await?;

        payments::Entity::find_by_id(payment.id)
            .one(&self.txn)
            .await?
            .map(Payment::from)
            .ok_or_else(|| {
                ApiError::Internal(anyhow!(
                    "Failed to read payment {} after upsert",
                    payment.id
                ))
            })
    }

    async fn lock_open_generic_payments(&mut self, student_id: Uuid) -> Result<Vec<Payment>> {
        let rows = payments::Entity::find()
            .filter(payments::Column::StudentId.eq(student_id))
            .filter(payments::Column::SubjectId.is_null())
            .filter(payments::Column::Status.eq(PaymentStatus::Confirmed))
            .order_by_asc(payments::Column::ConfirmedAt)
            .lock_exclusive()
            .all(&self.txn)
            .await?;

        Ok(rows.into_iter().map(Payment::from).collect())
    }
}

#[async_trait]
impl StoreTxn for SeaOrmTxn {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
