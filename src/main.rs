use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info};

use plantcare_subscriptions::{
    application::clock::SystemClock,
    infra::{
        app::create_app,
        config::AppConfig,
        setup::{init_app_state, init_tracing},
        subscription_scheduler::{SchedulerConfig, SubscriptionScheduler},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env();
    init_tracing(config.log_file.as_deref())?;

    let scheduler_config = SchedulerConfig::from(&config);
    let app_state = init_app_state(config).await?;

    // Read bind address from config before moving app_state
    let bind_addr = app_state.config.bind_addr;

    let scheduler = SubscriptionScheduler::new(
        app_state.subscription_reconciler.clone(),
        Arc::new(SystemClock),
        scheduler_config,
    );
    scheduler.start();

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Subscription service listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
