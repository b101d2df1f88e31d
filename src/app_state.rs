use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    services::{
        BalanceResolver, CreditLedger, CreditsService, MonthlyReset, PaymentEventService,
        ReservationCoordinator,
    },
    store::{CreditStore, SeaOrmStore},
};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub balance_resolver: Arc<BalanceResolver>,
    pub credits_service: Arc<CreditsService>,
    pub reservations: Arc<ReservationCoordinator>,
    pub payment_events: Arc<PaymentEventService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;

        if config.database.run_migrations {
            Migrator::up(&db, None).await?;
            tracing::info!("Database migrations applied");
        }

        let store: Arc<dyn CreditStore> = Arc::new(SeaOrmStore::new(db));
        Self::with_store(store, Arc::new(SystemClock), config)
    }

    /// Wire every service over an existing store and clock
    pub fn with_store(
        store: Arc<dyn CreditStore>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Result<Self, anyhow::Error> {
        let reset = MonthlyReset::new(config.credits.reset_offset()?);
        let ledger = CreditLedger::new(clock.clone(), reset);

        let balance_resolver = Arc::new(BalanceResolver::new(store.clone(), clock.clone(), reset));
        let credits_service = Arc::new(CreditsService::new(store.clone(), ledger.clone()));
        let reservations = Arc::new(ReservationCoordinator::new(
            store.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        let payment_events = Arc::new(PaymentEventService::new(store, ledger, clock));

        Ok(Self {
            balance_resolver,
            credits_service,
            reservations,
            payment_events,
            config: Arc::new(config),
        })
    }
}
