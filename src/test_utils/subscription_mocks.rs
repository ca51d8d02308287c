//! In-memory implementations of the subscription store and plan catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        CreateSubscriptionInput, ExpireOutcome, PlanCatalog, SubscriptionRepo,
    },
    domain::entities::{
        plan::{Plan, PlanTier},
        subscription::{Subscription, SubscriptionCounts},
    },
};

use super::factories::{premium_plan, regular_plan, ultimate_plan};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

/// Store double with failure and latency injection.
///
/// Every write path holds the map lock for its whole read-check-write sequence, which gives
/// the same all-or-nothing behaviour as a database transaction.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    writes: AtomicUsize,
    failing_reads: AtomicUsize,
    expire_calls: AtomicUsize,
    fail_expire_on: Mutex<Option<usize>>,
    failing_expiries: Mutex<HashSet<Uuid>>,
    delay: Mutex<Option<Duration>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, sub: Subscription) {
        self.subscriptions.lock().unwrap().insert(sub.id, sub);
    }

    pub fn get(&self, id: Uuid) -> Option<Subscription> {
        self.subscriptions.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().values().cloned().collect()
    }

    /// Number of committed writes. Seeding via [`Self::insert`] is not counted.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `n` read calls fail with a database error.
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Make the `n`-th call to `expire` (1-based) fail before touching any row.
    pub fn fail_expire_on_call(&self, n: usize) {
        *self.fail_expire_on.lock().unwrap() = Some(n);
    }

    /// Make every `expire` call for `id` fail before touching any row.
    pub fn fail_expire_for(&self, id: Uuid) {
        self.failing_expiries.lock().unwrap().insert(id);
    }

    /// Sleep this long at the start of every call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_read(&self) -> AppResult<()> {
        let failed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AppError::Database("injected read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        self.pause().await;
        self.check_read()?;
        Ok(self.get(id))
    }

    async fn get_active_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.pause().await;
        self.check_read()?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.user_id == user_id && s.is_active)
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        self.pause().await;
        self.check_read()?;
        let mut all = self.get_all();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        self.pause().await;
        self.check_read()?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_due_for_expiry(now))
            .cloned()
            .collect())
    }

    async fn count_by_active(&self) -> AppResult<SubscriptionCounts> {
        self.pause().await;
        self.check_read()?;
        let subs = self.subscriptions.lock().unwrap();
        let active = subs.values().filter(|s| s.is_active).count() as i64;
        Ok(SubscriptionCounts {
            active,
            expired: subs.len() as i64 - active,
        })
    }

    async fn create_active(
        &self,
        input: &CreateSubscriptionInput,
        supersedes: Option<Uuid>,
    ) -> AppResult<Subscription> {
        self.pause().await;
        let mut subs = self.subscriptions.lock().unwrap();

        let current = subs
            .values()
            .find(|s| s.user_id == input.user_id && s.is_active)
            .map(|s| s.id);
        if current != supersedes {
            return Err(AppError::Conflict(
                "Active subscription changed concurrently".into(),
            ));
        }
        if let Some(old) = supersedes.and_then(|id| subs.get_mut(&id)) {
            old.is_active = false;
        }

        let sub = Subscription {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            plan_id: input.plan_id,
            payment_id: input.payment_id.clone(),
            subscription_type: input.subscription_type,
            sub_start: input.sub_start,
            sub_end: input.sub_end,
            is_active: true,
            fallback_subscription_id: input.fallback_subscription_id,
            created_at: input.sub_start,
        };
        subs.insert(sub.id, sub.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(sub)
    }

    async fn expire(&self, id: Uuid, promote: Option<Uuid>) -> AppResult<ExpireOutcome> {
        self.pause().await;
        let call = self.expire_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_expire_on.lock().unwrap() == Some(call)
            || self.failing_expiries.lock().unwrap().contains(&id)
        {
            return Err(AppError::Database("injected expire failure".into()));
        }

        let mut subs = self.subscriptions.lock().unwrap();
        let user_id = match subs.get_mut(&id) {
            Some(sub) if sub.is_active => {
                sub.is_active = false;
                sub.user_id
            }
            _ => return Ok(ExpireOutcome::AlreadyClaimed),
        };
        self.writes.fetch_add(1, Ordering::SeqCst);

        let promoted = promote
            .and_then(|fid| subs.get_mut(&fid))
            .filter(|f| f.can_be_fallback_for(user_id) && !f.is_active)
            .map(|f| {
                f.is_active = true;
                f.id
            });

        Ok(match promoted {
            Some(fallback_id) => ExpireOutcome::ExpiredWithFallback { fallback_id },
            None => ExpireOutcome::Expired,
        })
    }
}

// ============================================================================
// InMemoryPlanCatalog
// ============================================================================

#[derive(Default)]
pub struct InMemoryPlanCatalog {
    pub plans: Mutex<Vec<Plan>>,
}

impl InMemoryPlanCatalog {
    pub fn with_default_plans() -> Self {
        Self {
            plans: Mutex::new(vec![regular_plan(), premium_plan(), ultimate_plan()]),
        }
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn get_by_name(&self, tier: PlanTier) -> AppResult<Option<Plan>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.tier == tier)
            .cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list(&self) -> AppResult<Vec<Plan>> {
        let mut plans = self.plans.lock().unwrap().clone();
        plans.sort_by_key(|p| p.rank());
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::entities::subscription::SubscriptionType,
        test_utils::{create_test_subscription, test_datetime},
    };

    #[tokio::test]
    async fn test_expire_does_not_promote_already_active_fallback() {
        let repo = InMemorySubscriptionRepo::new();
        let user_id = Uuid::new_v4();
        let lifetime = create_test_subscription(user_id, premium_plan().id, |s| {
            s.subscription_type = SubscriptionType::Lifetime;
            s.sub_end = None;
        });
        let monthly = create_test_subscription(user_id, ultimate_plan().id, |s| {
            s.sub_end = Some(test_datetime());
            s.fallback_subscription_id = Some(lifetime.id);
        });
        repo.insert(lifetime.clone());
        repo.insert(monthly.clone());

        let outcome = repo.expire(monthly.id, Some(lifetime.id)).await.unwrap();

        assert_eq!(outcome, ExpireOutcome::Expired);
        assert!(!repo.get(monthly.id).unwrap().is_active);
        assert!(repo.get(lifetime.id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_expire_promotes_parked_fallback() {
        let repo = InMemorySubscriptionRepo::new();
        let user_id = Uuid::new_v4();
        let lifetime = create_test_subscription(user_id, premium_plan().id, |s| {
            s.subscription_type = SubscriptionType::Lifetime;
            s.sub_end = None;
            s.is_active = false;
        });
        let monthly = create_test_subscription(user_id, ultimate_plan().id, |s| {
            s.fallback_subscription_id = Some(lifetime.id);
        });
        repo.insert(lifetime.clone());
        repo.insert(monthly.clone());

        let outcome = repo.expire(monthly.id, Some(lifetime.id)).await.unwrap();

        assert_eq!(
            outcome,
            ExpireOutcome::ExpiredWithFallback {
                fallback_id: lifetime.id
            }
        );
        assert!(repo.get(lifetime.id).unwrap().is_active);
    }
}
