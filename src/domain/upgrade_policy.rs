//! Pure decision over a user's current entitlement and a requested plan.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::{plan::Plan, subscription::Subscription};

pub const REASON_ACTIVE_SUBSCRIPTION: &str = "Cannot upgrade active subscription";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// No active subscription; a fresh one may be created.
    New,
    /// Same plan as the active subscription, which gets superseded.
    Extension { current_id: Uuid },
    /// Active lifetime subscription on another plan; it becomes the new row's fallback.
    LifetimeFallback { current_id: Uuid },
    Blocked { reason: &'static str },
}

/// Caller-facing shape of an [`UpgradeDecision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeEligibility {
    pub can_upgrade: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_extension: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_lifetime_fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_subscription_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&UpgradeDecision> for UpgradeEligibility {
    fn from(decision: &UpgradeDecision) -> Self {
        let blank = UpgradeEligibility {
            can_upgrade: true,
            is_extension: None,
            has_lifetime_fallback: None,
            fallback_subscription_id: None,
            reason: None,
        };
        match decision {
            UpgradeDecision::New => UpgradeEligibility {
                is_extension: Some(false),
                ..blank
            },
            UpgradeDecision::Extension { .. } => UpgradeEligibility {
                is_extension: Some(true),
                ..blank
            },
            UpgradeDecision::LifetimeFallback { current_id } => UpgradeEligibility {
                has_lifetime_fallback: Some(true),
                fallback_subscription_id: Some(*current_id),
                ..blank
            },
            UpgradeDecision::Blocked { reason } => UpgradeEligibility {
                can_upgrade: false,
                reason: Some((*reason).to_string()),
                ..blank
            },
        }
    }
}

/// Decide whether `requested` may be purchased on top of `current`.
///
/// The same plan is always an extension, whatever the current type. Any cross-plan request
/// over an active monthly subscription is blocked, downgrades included. Only an active
/// lifetime grant can be stacked on, in either direction.
pub fn evaluate_upgrade(current: Option<&Subscription>, requested: &Plan) -> UpgradeDecision {
    let Some(current) = current.filter(|s| s.is_active) else {
        return UpgradeDecision::New;
    };

    let same_plan = current.plan_id == requested.id;
    match (same_plan, current.is_lifetime()) {
        (true, _) => UpgradeDecision::Extension {
            current_id: current.id,
        },
        (false, false) => UpgradeDecision::Blocked {
            reason: REASON_ACTIVE_SUBSCRIPTION,
        },
        (false, true) => UpgradeDecision::LifetimeFallback {
            current_id: current.id,
        },
    }
}
