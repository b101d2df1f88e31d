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
                    .as_enum(EnrollmentStatus::Type)
                    .values([EnrollmentStatus::Active, EnrollmentStatus::Cancelled])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(PaymentStatus::Type)
                    .values([
                        PaymentStatus::Confirmed,
                        PaymentStatus::Canceled,
                        PaymentStatus::Refunded,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TutoringSessions::Table)
                    .if_not_exists()
                    .col(pk_uuid(TutoringSessions::Id))
                    .col(uuid(TutoringSessions::SubjectId).not_null())
                    .col(timestamp_with_time_zone(TutoringSessions::StartsAt).not_null())
                    .col(
                        timestamp_with_time_zone(TutoringSessions::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Enrollments::Table)
                    .if_not_exists()
                    .col(pk_uuid(Enrollments::Id))
                    .col(uuid(Enrollments::SessionId).not_null())
                    .col(uuid(Enrollments::StudentId).not_null())
                    .col(
                        ColumnDef::new(Enrollments::Status)
                            .custom(EnrollmentStatus::Type)
                            .not_null()
                            .default(SimpleExpr::Custom("'active'::enrollment_status".to_string())),
                    )
                    .col(small_integer(Enrollments::CreditsReserved).default(0).not_null())
                    .col(
                        timestamp_with_time_zone(Enrollments::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone_null(Enrollments::CancelledAt))
                    .check(Expr::col(Enrollments::CreditsReserved).is_in([0, 1]))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_session_id")
                            .from(Enrollments::Table, Enrollments::SessionId)
                            .to(TutoringSessions::Table, TutoringSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A student holds at most one active enrollment per session
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_active_student_session
                ON enrollments (student_id, session_id)
                WHERE status = 'active';
                "#,
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(pk_uuid(Payments::Id))
                    .col(uuid(Payments::StudentId).not_null())
                    .col(uuid_null(Payments::SubjectId))
                    .col(integer(Payments::SessionCount).not_null())
                    .col(
                        ColumnDef::new(Payments::Status)
                            .custom(PaymentStatus::Type)
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone(Payments::ConfirmedAt).not_null())
                    .col(
                        timestamp_with_time_zone(Payments::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .check(Expr::col(Payments::SessionCount).gt(0))
                    .to_owned(),
            )
            .await?;

        // Lookup of unallocated "any subject" packages at booking time
        manager
            .create_index(
                Index::create()
                    .name("idx_payments_student_status_confirmed")
                    .table(Payments::Table)
                    .col(Payments::StudentId)
                    .col(Payments::Status)
                    .col(Payments::ConfirmedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Enrollments::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TutoringSessions::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(PaymentStatus::Type).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(EnrollmentStatus::Type).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum EnrollmentStatus {
    #[sea_orm(iden = "enrollment_status")]
    Type,
    Active,
    Cancelled,
}

#[derive(DeriveIden)]
enum PaymentStatus {
    #[sea_orm(iden = "payment_status")]
    Type,
    Confirmed,
    Canceled,
    Refunded,
}

#[derive(DeriveIden)]
enum TutoringSessions {
    Table,
    Id,
    SubjectId,
    StartsAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Enrollments {
    Table,
    Id,
    SessionId,
    StudentId,
    Status,
    CreditsReserved,
    CreatedAt,
    CancelledAt,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    StudentId,
    SubjectId,
    SessionCount,
    Status,
    ConfirmedAt,
    UpdatedAt,
}
