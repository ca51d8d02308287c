//! Builds an `AppState` backed by in-memory mocks for route tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    domain::entities::subscription::Subscription,
    infra::config::AppConfig,
    test_utils::{InMemoryPlanCatalog, InMemorySubscriptionRepo, ManualClock, test_datetime},
    use_cases::{reconciler::SubscriptionReconciler, subscription::SubscriptionUseCases},
};

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::new("postgres://localhost/test".into()),
        database_max_connections: 1,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        store_timeout: Duration::from_secs(5),
        expiration_interval: Duration::from_secs(3600),
        daily_maintenance_at: NaiveTime::MIN,
        log_file: None,
    }
}

pub struct TestAppStateBuilder {
    subscriptions: Vec<Subscription>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            subscriptions: vec![],
        }
    }

    /// Seed a subscription row.
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Returns the state together with the repo so tests can inspect or sabotage it.
    pub fn build(self) -> (AppState, Arc<InMemorySubscriptionRepo>) {
        let config = test_config();
        let clock = Arc::new(ManualClock::new(test_datetime()));
        let repo = Arc::new(InMemorySubscriptionRepo::new());
        for sub in self.subscriptions {
            repo.insert(sub);
        }

        let use_cases = SubscriptionUseCases::new(
            repo.clone(),
            Arc::new(InMemoryPlanCatalog::with_default_plans()),
            clock.clone(),
            config.store_timeout,
        );
        let reconciler =
            SubscriptionReconciler::new(repo.clone(), clock, config.store_timeout);

        let app_state = AppState {
            config: Arc::new(config),
            subscription_use_cases: Arc::new(use_cases),
            subscription_reconciler: Arc::new(reconciler),
        };
        (app_state, repo)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
