use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::clock::{Clock, SystemClock},
    infra::{config::AppConfig, postgres_persistence},
    use_cases::{
        reconciler::SubscriptionReconciler,
        subscription::{PlanCatalog, SubscriptionRepo, SubscriptionUseCases},
    },
};

pub async fn init_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let postgres_arc = Arc::new(postgres_persistence(&config).await?);

    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let plan_catalog_arc = postgres_arc.clone() as Arc<dyn PlanCatalog>;
    let clock = Arc::new(SystemClock) as Arc<dyn Clock>;

    let subscription_use_cases = SubscriptionUseCases::new(
        subscription_repo_arc.clone(),
        plan_catalog_arc,
        clock.clone(),
        config.store_timeout,
    );

    let subscription_reconciler =
        SubscriptionReconciler::new(subscription_repo_arc, clock, config.store_timeout);

    Ok(AppState {
        config: Arc::new(config),
        subscription_use_cases: Arc::new(subscription_use_cases),
        subscription_reconciler: Arc::new(subscription_reconciler),
    })
}

pub fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "plantcare_subscriptions=info,tower_http=info".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), only when configured
    let json_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| anyhow::anyhow!("cannot create log file {}: {e}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_current_span(true)
                    .with_span_list(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();

    Ok(())
}
