// Integration tests

mod postgres_test;
mod reservation_test;

use lessonbank::{
    clock::{Clock, ManualClock},
    config::{Config, CreditsConfig, DatabaseConfig, ServerConfig},
    models::{booking::TutoringSession, ledger::CreditKey},
    services::{CreditLedger, MonthlyReset},
    store::MemoryStore,
    AppState,
};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Services wired over an in-memory store and a clock the test controls
pub struct TestEnv {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
}

impl TestEnv {
    pub fn ledger(&self) -> CreditLedger {
        CreditLedger::new(self.clock.clone(), MonthlyReset::utc())
    }

    /// Register a session of `subject_id` starting `hours` from the current test time
    pub async fn add_session(&self, subject_id: Uuid, hours: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .add_session(TutoringSession {
                id,
                subject_id,
                starts_at: self.clock.now() + time::Duration::hours(hours),
            })
            .await;
        id
    }

    pub async fn stored_balance(&self, key: CreditKey) -> i32 {
        self.store
            .stored_balance(key)
            .await
            .map(|row| row.balance)
            .unwrap_or(0)
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            run_migrations: false,
        },
        credits: CreditsConfig::default(),
    }
}

// Test setup helpers
pub fn setup_test_environment(now: OffsetDateTime) -> TestEnv {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(now));
    let state = AppState::with_store(Arc::new(store.clone()), clock.clone(), test_config())
        .expect("test config is valid");

    TestEnv {
        store,
        clock,
        state,
    }
}
