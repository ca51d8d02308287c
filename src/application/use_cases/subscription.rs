use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{clock::Clock, store_timeout::with_store_timeout},
    domain::{
        entities::{
            plan::{Plan, PlanChange, PlanTier},
            subscription::{Subscription, SubscriptionCounts, SubscriptionType},
        },
        upgrade_policy::{UpgradeDecision, UpgradeEligibility, evaluate_upgrade},
    },
};

// ============================================================================
// Input Types
// ============================================================================

/// Arguments of `create_subscription`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub payment_id: Option<String>,
    pub subscription_type: SubscriptionType,
}

/// An already-verified checkout handed over by the payment flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub user_id: Uuid,
    pub plan_name: String,
    pub payment_id: Option<String>,
    pub subscription_type: SubscriptionType,
}

/// Row to insert through [`SubscriptionRepo::create_active`].
#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub payment_id: Option<String>,
    pub subscription_type: SubscriptionType,
    pub sub_start: DateTime<Utc>,
    pub sub_end: Option<DateTime<Utc>>,
    pub fallback_subscription_id: Option<Uuid>,
}

/// Result of one conditional expiry write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireOutcome {
    /// The row was no longer active; another run got to it first.
    AlreadyClaimed,
    Expired,
    ExpiredWithFallback { fallback_id: Uuid },
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn get_by_name(&self, tier: PlanTier) -> AppResult<Option<Plan>>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>>;
    async fn list(&self) -> AppResult<Vec<Plan>>;
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    async fn get_active_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;
    async fn list_all(&self) -> AppResult<Vec<Subscription>>;

    /// Active monthly rows whose `sub_end` is at or before `now`.
    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;

    async fn count_by_active(&self) -> AppResult<SubscriptionCounts>;

    /// Insert a new active row for `input.user_id`, atomically with respect to other writers
    /// for the same user.
    ///
    /// `supersedes` must name the user's currently active row (or be `None` when there is
    /// none); that row is deactivated in the same transaction. A mismatch fails with
    /// `AppError::Conflict` and writes nothing.
    async fn create_active(
        &self,
        input: &CreateSubscriptionInput,
        supersedes: Option<Uuid>,
    ) -> AppResult<Subscription>;

    /// Deactivate `id` only if it is still active, then activate `promote` if given.
    /// Both writes commit together or not at all.
    async fn expire(&self, id: Uuid, promote: Option<Uuid>) -> AppResult<ExpireOutcome>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    plans: Arc<dyn PlanCatalog>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl SubscriptionUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        plans: Arc<dyn PlanCatalog>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            plans,
            clock,
            store_timeout,
        }
    }

    /// The user's current entitlement, if any.
    pub async fn get_user_active_subscription(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        with_store_timeout(
            self.store_timeout,
            "get_active_by_user",
            self.repo.get_active_by_user(user_id),
        )
        .await
    }

    /// Read-only eligibility check for purchasing `plan_name`.
    #[instrument(skip(self))]
    pub async fn can_user_upgrade(
        &self,
        user_id: Uuid,
        plan_name: &str,
    ) -> AppResult<UpgradeEligibility> {
        let requested = self.plan_by_name(plan_name).await?;
        let current = self.get_user_active_subscription(user_id).await?;

        if let Some(current) = &current {
            if let Some(current_plan) = self.plan_by_id_opt(current.plan_id).await? {
                debug!(
                    change = PlanChange::between(&current_plan, &requested).as_str(),
                    "Evaluating plan change"
                );
            }
        }

        let decision = evaluate_upgrade(current.as_ref(), &requested);
        Ok(UpgradeEligibility::from(&decision))
    }

    /// Create a subscription without a fallback link.
    ///
    /// Re-validates eligibility against the store instead of trusting an earlier
    /// `can_user_upgrade` call.
    #[instrument(skip(self), fields(user_id = %args.user_id))]
    pub async fn create_subscription(&self, args: NewSubscription) -> AppResult<Subscription> {
        self.create(args, None).await
    }

    /// Create a subscription that falls back to an earlier lifetime grant once it lapses.
    #[instrument(skip(self), fields(user_id = %args.user_id))]
    pub async fn create_subscription_with_fallback(
        &self,
        args: NewSubscription,
        fallback_subscription_id: Uuid,
    ) -> AppResult<Subscription> {
        self.create(args, Some(fallback_subscription_id)).await
    }

    /// Entry point for a completed checkout: resolves the plan by name and links the
    /// current lifetime grant as fallback when one is active.
    #[instrument(skip(self), fields(user_id = %confirmation.user_id))]
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> AppResult<Subscription> {
        let plan = self.plan_by_name(&confirmation.plan_name).await?;
        let current = self.get_user_active_subscription(confirmation.user_id).await?;

        let args = NewSubscription {
            user_id: confirmation.user_id,
            plan_id: plan.id,
            payment_id: confirmation.payment_id,
            subscription_type: confirmation.subscription_type,
        };

        match evaluate_upgrade(current.as_ref(), &plan) {
            UpgradeDecision::LifetimeFallback { current_id } => {
                self.create_subscription_with_fallback(args, current_id).await
            }
            _ => self.create_subscription(args).await,
        }
    }

    /// Every subscription row, for reporting.
    pub async fn find_all(&self) -> AppResult<Vec<Subscription>> {
        with_store_timeout(self.store_timeout, "list_all", self.repo.list_all()).await
    }

    pub async fn list_plans(&self) -> AppResult<Vec<Plan>> {
        with_store_timeout(self.store_timeout, "list_plans", self.plans.list()).await
    }

    async fn create(
        &self,
        args: NewSubscription,
        fallback_subscription_id: Option<Uuid>,
    ) -> AppResult<Subscription> {
        let plan = self
            .plan_by_id_opt(args.plan_id)
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown plan: {}", args.plan_id)))?;

        if let Some(fallback_id) = fallback_subscription_id {
            self.validate_fallback(args.user_id, fallback_id).await?;
        }

        let current = self.get_user_active_subscription(args.user_id).await?;
        let now = self.clock.now();

        let (supersedes, fallback, sub_start_for_end) =
            match evaluate_upgrade(current.as_ref(), &plan) {
                UpgradeDecision::Blocked { reason } => {
                    return Err(AppError::Conflict(reason.to_string()));
                }
                UpgradeDecision::New => (None, fallback_subscription_id, now),
                UpgradeDecision::Extension { current_id } => {
                    // Remaining paid time carries over into the new period.
                    let carried_from = current
                        .as_ref()
                        .and_then(|c| c.sub_end)
                        .filter(|end| *end > now)
                        .unwrap_or(now);
                    // A monthly row bought over a lifetime grant keeps that grant as fallback.
                    let inherited = current.as_ref().and_then(|c| {
                        if c.is_lifetime() && args.subscription_type == SubscriptionType::Monthly {
                            Some(c.id)
                        } else {
                            c.fallback_subscription_id
                        }
                    });
                    (
                        Some(current_id),
                        fallback_subscription_id.or(inherited),
                        carried_from,
                    )
                }
                UpgradeDecision::LifetimeFallback { current_id } => {
                    match fallback_subscription_id {
                        Some(id) if id == current_id => (Some(current_id), Some(id), now),
                        Some(_) => {
                            return Err(AppError::FallbackInvalid(
                                "Fallback must be the currently active lifetime subscription"
                                    .into(),
                            ));
                        }
                        None => {
                            return Err(AppError::Conflict(
                                "Active lifetime subscription must be linked as fallback".into(),
                            ));
                        }
                    }
                }
            };

        let input = CreateSubscriptionInput {
            user_id: args.user_id,
            plan_id: plan.id,
            payment_id: args.payment_id,
            subscription_type: args.subscription_type,
            sub_start: now,
            sub_end: args.subscription_type.period_end(sub_start_for_end),
            fallback_subscription_id: fallback,
        };

        let created = with_store_timeout(
            self.store_timeout,
            "create_active",
            self.repo.create_active(&input, supersedes),
        )
        .await?;

        info!(
            subscription_id = %created.id,
            plan = plan.name(),
            subscription_type = %created.subscription_type,
            superseded = ?supersedes,
            fallback_subscription_id = ?created.fallback_subscription_id,
            "Subscription created"
        );

        Ok(created)
    }

    async fn validate_fallback(&self, user_id: Uuid, fallback_id: Uuid) -> AppResult<Subscription> {
        let fallback = with_store_timeout(
            self.store_timeout,
            "get_by_id",
            self.repo.get_by_id(fallback_id),
        )
        .await?
        .ok_or_else(|| AppError::FallbackInvalid("Fallback subscription not found".into()))?;

        if fallback.user_id != user_id {
            return Err(AppError::FallbackInvalid(
                "Fallback subscription belongs to another user".into(),
            ));
        }
        if !fallback.is_lifetime() {
            return Err(AppError::FallbackInvalid(
                "Fallback subscription must be a lifetime subscription".into(),
            ));
        }
        Ok(fallback)
    }

    async fn plan_by_name(&self, plan_name: &str) -> AppResult<Plan> {
        let tier: PlanTier = plan_name
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Unknown plan: {}", plan_name)))?;

        with_store_timeout(self.store_timeout, "get_plan_by_name", self.plans.get_by_name(tier))
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown plan: {}", plan_name)))
    }

    async fn plan_by_id_opt(&self, plan_id: Uuid) -> AppResult<Option<Plan>> {
        with_store_timeout(self.store_timeout, "get_plan_by_id", self.plans.get_by_id(plan_id))
            .await
    }
}
