//! Test data factories.
//!
//! Each factory returns a complete, valid object. Use the closure parameter to override
//! specific fields.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    plan::{Plan, PlanTier},
    subscription::{Subscription, SubscriptionType},
};

/// Plan ids match the rows seeded by the initial migration.
pub fn regular_plan() -> Plan {
    Plan {
        id: Uuid::from_u128(1),
        tier: PlanTier::Regular,
        price_monthly_cents: 499,
        price_lifetime_cents: 4_900,
    }
}

pub fn premium_plan() -> Plan {
    Plan {
        id: Uuid::from_u128(2),
        tier: PlanTier::Premium,
        price_monthly_cents: 999,
        price_lifetime_cents: 9_900,
    }
}

pub fn ultimate_plan() -> Plan {
    Plan {
        id: Uuid::from_u128(3),
        tier: PlanTier::Ultimate,
        price_monthly_cents: 1_999,
        price_lifetime_cents: 19_900,
    }
}

/// Active monthly subscription starting at [`test_datetime`].
pub fn create_test_subscription(
    user_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let start = test_datetime();
    let mut sub = Subscription {
        id: Uuid::new_v4(),
        user_id,
        plan_id,
        payment_id: Some(format!("pay_{}", Uuid::new_v4().simple())),
        subscription_type: SubscriptionType::Monthly,
        sub_start: start,
        sub_end: SubscriptionType::Monthly.period_end(start),
        is_active: true,
        fallback_subscription_id: None,
        created_at: start,
    };
    overrides(&mut sub);
    sub
}

pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_subscription_defaults() {
        let user_id = Uuid::new_v4();
        let sub = create_test_subscription(user_id, premium_plan().id, |_| {});
        assert_eq!(sub.user_id, user_id);
        assert!(sub.is_active);
        assert!(sub.sub_end.unwrap() > sub.sub_start);
    }

    #[test]
    fn test_create_subscription_overrides() {
        let sub = create_test_subscription(Uuid::new_v4(), premium_plan().id, |s| {
            s.subscription_type = SubscriptionType::Lifetime;
            s.sub_end = None;
        });
        assert!(sub.is_lifetime());
    }
}
