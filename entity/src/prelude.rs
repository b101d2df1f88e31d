pub use super::credit_balances::Entity as CreditBalances;
pub use super::credit_ledger_entries::Entity as CreditLedgerEntries;
pub use super::enrollments::Entity as Enrollments;
pub use super::payments::Entity as Payments;
pub use super::tutoring_sessions::Entity as TutoringSessions;
