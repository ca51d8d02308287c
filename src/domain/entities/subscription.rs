use std::fmt;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Length of one monthly billing period.
pub const BILLING_INTERVAL: Months = Months::new(1);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "subscription_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionType {
    Monthly,
    Lifetime,
}

impl SubscriptionType {
    /// End of a period starting at `start`. Lifetime grants never end.
    pub fn period_end(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SubscriptionType::Monthly => start.checked_add_months(BILLING_INTERVAL),
            SubscriptionType::Lifetime => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    /// Opaque reference to the external payment record.
    pub payment_id: Option<String>,
    pub subscription_type: SubscriptionType,
    pub sub_start: DateTime<Utc>,
    /// `None` iff `subscription_type` is lifetime.
    pub sub_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub fallback_subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_lifetime(&self) -> bool {
        self.subscription_type == SubscriptionType::Lifetime
    }

    /// Whether the reconciler should expire this row at `now`.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.subscription_type == SubscriptionType::Monthly
            && self.sub_end.is_some_and(|end| end <= now)
    }

    /// A fallback must be a lifetime grant owned by the same user.
    pub fn can_be_fallback_for(&self, user_id: Uuid) -> bool {
        self.user_id == user_id && self.is_lifetime()
    }
}

/// Active vs. inactive row totals, reported by daily maintenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCounts {
    pub active: i64,
    pub expired: i64,
}

impl fmt::Display for SubscriptionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Active subscriptions: {}, Expired: {}",
            self.active, self.expired
        )
    }
}
