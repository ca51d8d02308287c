use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Paid entitlement tiers, declared in rank order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum PlanTier {
    Regular,
    Premium,
    Ultimate,
}

impl PlanTier {
    /// Numeric rank as stored in the `plans.rank` column.
    pub fn rank(&self) -> i32 {
        match self {
            PlanTier::Regular => 1,
            PlanTier::Premium => 2,
            PlanTier::Ultimate => 3,
        }
    }
}

/// Direction of a move between two plans, by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanChange {
    Same,
    Upgrade,
    Downgrade,
}

impl PlanChange {
    pub fn between(from: &Plan, to: &Plan) -> Self {
        match to.rank().cmp(&from.rank()) {
            std::cmp::Ordering::Equal => PlanChange::Same,
            std::cmp::Ordering::Greater => PlanChange::Upgrade,
            std::cmp::Ordering::Less => PlanChange::Downgrade,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanChange::Same => "same",
            PlanChange::Upgrade => "upgrade",
            PlanChange::Downgrade => "downgrade",
        }
    }
}

/// Immutable catalog entry. Prices are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "PlanJson")]
pub struct Plan {
    pub id: Uuid,
    pub tier: PlanTier,
    pub price_monthly_cents: i32,
    pub price_lifetime_cents: i32,
}

impl Plan {
    pub fn name(&self) -> &str {
        self.tier.as_ref()
    }

    pub fn rank(&self) -> i32 {
        self.tier.rank()
    }
}

/// Catalog wire shape: `{id, name, rank, priceMonthly, priceLifetime}`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanJson {
    id: Uuid,
    name: String,
    rank: i32,
    price_monthly: i32,
    price_lifetime: i32,
}

impl From<Plan> for PlanJson {
    fn from(plan: Plan) -> Self {
        PlanJson {
            id: plan.id,
            name: plan.name().to_string(),
            rank: plan.rank(),
            price_monthly: plan.price_monthly_cents,
            price_lifetime: plan.price_lifetime_cents,
        }
    }
}
