// Service modules
pub mod balance_resolver;
pub mod credit_ledger;
pub mod credits_service;
pub mod idempotency;
pub mod payment_events;
pub mod reservation_coordinator;

pub use balance_resolver::{BalanceResolver, MonthlyReset};
pub use credit_ledger::CreditLedger;
pub use credits_service::CreditsService;
pub use payment_events::{
    PaymentConfirmed, PaymentCreditOutcome, PaymentEventService, PaymentReversalOutcome,
    PaymentReversed,
};
pub use reservation_coordinator::ReservationCoordinator;
