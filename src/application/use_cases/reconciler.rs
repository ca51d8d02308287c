use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        clock::Clock,
        store_timeout::with_store_timeout,
        use_cases::subscription::{ExpireOutcome, SubscriptionRepo},
    },
    domain::entities::subscription::{Subscription, SubscriptionCounts},
};

/// Upper bound on fallback hops followed for one expiring row.
pub const MAX_FALLBACK_DEPTH: usize = 5;

/// Outcome of one expiration pass. The two counters partition the rows expired in that pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationReport {
    pub regular_expired: u32,
    pub expired_with_fallback: u32,
}

impl ExpirationReport {
    pub fn total(&self) -> u32 {
        self.regular_expired + self.expired_with_fallback
    }
}

#[derive(Clone)]
pub struct SubscriptionReconciler {
    repo: Arc<dyn SubscriptionRepo>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl SubscriptionReconciler {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            clock,
            store_timeout,
        }
    }

    /// Expire lapsed monthly subscriptions, restoring a lifetime fallback where one resolves.
    ///
    /// Never fails. A row whose write fails is logged and skipped; a store timeout stops the
    /// pass. Either way the report covers what was committed and untouched rows are picked
    /// up by the next pass.
    #[instrument(skip(self))]
    pub async fn handle_expiration_with_fallback(&self) -> ExpirationReport {
        let mut report = ExpirationReport::default();
        let now = self.clock.now();

        let due = match with_store_timeout(
            self.store_timeout,
            "list_due_for_expiry",
            self.repo.list_due_for_expiry(now),
        )
        .await
        {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to scan for expired subscriptions");
                return report;
            }
        };

        if due.is_empty() {
            debug!("No subscriptions due for expiry");
            return report;
        }

        for sub in due {
            match self.expire_one(&sub).await {
                Ok(ExpireOutcome::AlreadyClaimed) => {
                    debug!(subscription_id = %sub.id, "Subscription already expired by another run");
                }
                Ok(ExpireOutcome::Expired) => {
                    report.regular_expired += 1;
                    info!(
                        subscription_id = %sub.id,
                        user_id = %sub.user_id,
                        "Subscription expired"
                    );
                }
                Ok(ExpireOutcome::ExpiredWithFallback { fallback_id }) => {
                    report.expired_with_fallback += 1;
                    info!(
                        subscription_id = %sub.id,
                        user_id = %sub.user_id,
                        fallback_subscription_id = %fallback_id,
                        "Subscription expired, fallback restored"
                    );
                }
                Err(e @ AppError::StoreTimeout(_)) => {
                    error!(
                        subscription_id = %sub.id,
                        error = %e,
                        "Store timed out expiring subscription, abandoning this run"
                    );
                    break;
                }
                Err(e) => {
                    error!(
                        subscription_id = %sub.id,
                        error = %e,
                        "Failed to expire subscription, skipping it"
                    );
                }
            }
        }

        if report.total() > 0 {
            info!(
                regular_expired = report.regular_expired,
                expired_with_fallback = report.expired_with_fallback,
                "Expiration run finished"
            );
        }

        report
    }

    /// Current active/inactive totals.
    pub async fn subscription_counts(&self) -> AppResult<SubscriptionCounts> {
        with_store_timeout(
            self.store_timeout,
            "count_by_active",
            self.repo.count_by_active(),
        )
        .await
    }

    /// Read-only daily report of subscription totals.
    #[instrument(skip(self))]
    pub async fn daily_maintenance(&self) {
        match self.subscription_counts().await {
            Ok(counts) => info!("{}", counts),
            Err(e) => error!(error = %e, "Daily subscription maintenance failed"),
        }
    }

    async fn expire_one(&self, sub: &Subscription) -> AppResult<ExpireOutcome> {
        let promote = match sub.fallback_subscription_id {
            Some(_) => self.resolve_fallback(sub).await?,
            None => None,
        };

        with_store_timeout(
            self.store_timeout,
            "expire",
            self.repo.expire(sub.id, promote),
        )
        .await
    }

    /// Walk the fallback links of `sub` to the nearest lifetime row owned by the same user.
    async fn resolve_fallback(&self, sub: &Subscription) -> AppResult<Option<Uuid>> {
        let mut visited = HashSet::from([sub.id]);
        let mut next = sub.fallback_subscription_id;

        for _ in 0..MAX_FALLBACK_DEPTH {
            let Some(id) = next else {
                return Ok(None);
            };
            if !visited.insert(id) {
                warn!(subscription_id = %sub.id, "Fallback chain loops back on itself");
                return Ok(None);
            }

            let candidate = with_store_timeout(
                self.store_timeout,
                "get_by_id",
                self.repo.get_by_id(id),
            )
            .await?;

            let Some(candidate) = candidate else {
                warn!(
                    subscription_id = %sub.id,
                    fallback_subscription_id = %id,
                    "Fallback subscription no longer exists"
                );
                return Ok(None);
            };

            if candidate.can_be_fallback_for(sub.user_id) {
                return Ok(Some(candidate.id));
            }
            next = candidate.fallback_subscription_id;
        }

        warn!(
            subscription_id = %sub.id,
            max_depth = MAX_FALLBACK_DEPTH,
            "Fallback chain too deep, expiring without fallback"
        );
        Ok(None)
    }
}
