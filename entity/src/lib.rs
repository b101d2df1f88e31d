//! SeaORM entities for the credit ledger and the booking tables it reads.

pub mod prelude;

pub mod credit_balances;
pub mod credit_ledger_entries;
pub mod enrollments;
pub mod payments;
pub mod sea_orm_active_enums;
pub mod tutoring_sessions;
