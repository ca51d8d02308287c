use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{Instrument, error, info, info_span, warn};

use crate::{
    application::clock::Clock,
    infra::config::AppConfig,
    use_cases::reconciler::{ExpirationReport, SubscriptionReconciler},
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// The two recurring reconciliation jobs.
#[async_trait]
pub trait ReconciliationJobs: Send + Sync + 'static {
    async fn run_expiration(&self) -> ExpirationReport;
    async fn run_maintenance(&self);
}

#[async_trait]
impl ReconciliationJobs for SubscriptionReconciler {
    async fn run_expiration(&self) -> ExpirationReport {
        self.handle_expiration_with_fallback().await
    }

    async fn run_maintenance(&self) {
        self.daily_maintenance().await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub expiration_interval: Duration,
    pub daily_maintenance_at: NaiveTime,
}

impl From<&AppConfig> for SchedulerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            expiration_interval: config.expiration_interval,
            daily_maintenance_at: config.daily_maintenance_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Expiration,
    Maintenance,
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Expiration => "expiration",
            Job::Maintenance => "daily_maintenance",
        }
    }

    async fn run(self, jobs: Arc<dyn ReconciliationJobs>) {
        match self {
            Job::Expiration => {
                let report = jobs.run_expiration().await;
                info!(
                    regular_expired = report.regular_expired,
                    expired_with_fallback = report.expired_with_fallback,
                    "Expiration tick finished"
                );
            }
            Job::Maintenance => jobs.run_maintenance().await,
        }
    }
}

/// Owns the hourly expiration and daily maintenance triggers.
///
/// Constructed once by the entry point; `stop` halts both triggers and waits for a tick that
/// is already running.
pub struct SubscriptionScheduler {
    jobs: Arc<dyn ReconciliationJobs>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriptionScheduler {
    pub fn new(
        jobs: Arc<dyn ReconciliationJobs>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            jobs,
            clock,
            config,
            shutdown: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Start both triggers. Calling it on a running scheduler does nothing.
    pub fn start(&self) {
        let Ok(mut shutdown) = self.shutdown.lock() else {
            error!("Scheduler state poisoned, not starting");
            return;
        };
        if shutdown.is_some() {
            warn!("Subscription scheduler already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        let now = Instant::now();

        let mut expiration = interval_at(
            now + self.config.expiration_interval,
            self.config.expiration_interval,
        );
        expiration.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let first_daily = delay_until_next(self.clock.now(), self.config.daily_maintenance_at);
        let mut daily = interval_at(now + first_daily, DAY);
        daily.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let triggers = [
            tokio::spawn(run_trigger(
                Job::Expiration,
                expiration,
                self.jobs.clone(),
                rx.clone(),
            )),
            tokio::spawn(run_trigger(Job::Maintenance, daily, self.jobs.clone(), rx)),
        ];

        if let Ok(mut handles) = self.handles.lock() {
            handles.extend(triggers);
        }
        *shutdown = Some(tx);

        info!(
            expiration_every_secs = self.config.expiration_interval.as_secs(),
            daily_at = %self.config.daily_maintenance_at,
            first_daily_in_secs = first_daily.as_secs(),
            "Subscription scheduler started"
        );
    }

    /// Stop both triggers and wait for them to finish.
    pub async fn stop(&self) {
        let sender = self.shutdown.lock().ok().and_then(|mut guard| guard.take());
        let Some(sender) = sender else {
            return;
        };
        let _ = sender.send(true);

        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .map(|mut guard| guard.drain(..).collect())
            .unwrap_or_default();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler trigger task panicked");
            }
        }

        info!("Subscription scheduler stopped");
    }
}

async fn run_trigger(
    job: Job,
    mut ticker: Interval,
    jobs: Arc<dyn ReconciliationJobs>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let span = info_span!("subscription_scheduler", job = job.name());
                let tick = tokio::spawn(job.run(jobs.clone()).instrument(span));
                if let Err(e) = tick.await {
                    error!(job = job.name(), error = %e, "Scheduled job panicked");
                }
            }
        }
    }
}

/// Time from `now` until the next occurrence of `at` (UTC). An exact match counts as next day.
fn delay_until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
