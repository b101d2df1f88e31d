use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(CreditReason::Type)
                    .values([
                        CreditReason::PaymentCredit,
                        CreditReason::EnrollReserve,
                        CreditReason::EnrollRelease,
                        CreditReason::AdminAdjust,
                    ])
                    .to_owned(),
            )
            .await?;

        // One balance row per (student, subject), maintained incrementally
        manager
            .create_table(
                Table::create()
                    .table(CreditBalances::Table)
                    .if_not_exists()
                    .col(pk_uuid(CreditBalances::Id))
                    .col(uuid(CreditBalances::StudentId).not_null())
                    .col(uuid(CreditBalances::SubjectId).not_null())
                    .col(integer(CreditBalances::Balance).default(0).not_null())
                    .col(
                        timestamp_with_time_zone(CreditBalances::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(CreditBalances::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_credit_balances_student_subject")
                    .table(CreditBalances::Table)
                    .col(CreditBalances::StudentId)
                    .col(CreditBalances::SubjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CreditLedgerEntries::Table)
                    .if_not_exists()
                    .col(pk_uuid(CreditLedgerEntries::Id))
                    .col(uuid(CreditLedgerEntries::StudentId).not_null())
                    .col(uuid(CreditLedgerEntries::SubjectId).not_null())
                    .col(integer(CreditLedgerEntries::Delta).not_null())
                    .col(
                        ColumnDef::new(CreditLedgerEntries::Reason)
                            .custom(CreditReason::Type)
                            .not_null(),
                    )
                    .col(uuid_null(CreditLedgerEntries::EnrollmentId))
                    .col(uuid_null(CreditLedgerEntries::PaymentId))
                    .col(text_null(CreditLedgerEntries::Note))
                    .col(
                        timestamp_with_time_zone(CreditLedgerEntries::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one grant and one reversal per payment. NULL payment ids stay distinct.
        manager
            .create_index(
                Index::create()
                    .name("idx_credit_ledger_payment_reason")
                    .table(CreditLedgerEntries::Table)
                    .col(CreditLedgerEntries::PaymentId)
                    .col(CreditLedgerEntries::Reason)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // At most one reserve and one release per enrollment
        manager
            .create_index(
                Index::create()
                    .name("idx_credit_ledger_enrollment_reason")
                    .table(CreditLedgerEntries::Table)
                    .col(CreditLedgerEntries::EnrollmentId)
                    .col(CreditLedgerEntries::Reason)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_credit_ledger_student_subject_created")
                    .table(CreditLedgerEntries::Table)
                    .col(CreditLedgerEntries::StudentId)
                    .col(CreditLedgerEntries::SubjectId)
                    .col(CreditLedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // The ledger is append-only
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE OR REPLACE FUNCTION reject_ledger_mutation()
                RETURNS TRIGGER AS $$
                BEGIN
                    RAISE EXCEPTION 'credit_ledger_entries is append-only';
                END;
                $$ LANGUAGE plpgsql;
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER credit_ledger_entries_append_only
                BEFORE UPDATE OR DELETE ON credit_ledger_entries
                FOR EACH ROW
                EXECUTE FUNCTION reject_ledger_mutation();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CreditLedgerEntries::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(CreditBalances::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS reject_ledger_mutation() CASCADE;")
            .await?;

        manager
            .drop_type(Type::drop().name(CreditReason::Type).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum CreditReason {
    #[sea_orm(iden = "credit_reason")]
    Type,
    PaymentCredit,
    EnrollReserve,
    EnrollRelease,
    AdminAdjust,
}

#[derive(DeriveIden)]
enum CreditBalances {
    Table,
    Id,
    StudentId,
    SubjectId,
    Balance,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CreditLedgerEntries {
    Table,
    Id,
    StudentId,
    SubjectId,
    Delta,
    Reason,
    EnrollmentId,
    PaymentId,
    Note,
    CreatedAt,
}
