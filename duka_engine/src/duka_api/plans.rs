use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db_types::{Money, PlanName, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: PlanName,
    /// `None` means unlimited
    pub monthly_order_limit: Option<i64>,
    pub monthly_price: Money,
}

pub const PLANS: [Plan; 4] = [
    Plan { name: PlanName::Free, monthly_order_limit: Some(30), monthly_price: Money::from_francs(0) },
    Plan { name: PlanName::Starter, monthly_order_limit: Some(200), monthly_price: Money::from_francs(5_000) },
    Plan { name: PlanName::Growth, monthly_order_limit: Some(1_000), monthly_price: Money::from_francs(15_000) },
    Plan { name: PlanName::Pro, monthly_order_limit: None, monthly_price: Money::from_francs(40_000) },
];

pub fn plan(name: PlanName) -> Plan {
    match name {
        PlanName::Free => PLANS[0],
        PlanName::Starter => PLANS[1],
        PlanName::Growth => PLANS[2],
        PlanName::Pro => PLANS[3],
    }
}

/// Merchants without a running subscription are on the free plan.
pub fn effective_plan(subscription: Option<&Subscription>, now: DateTime<Utc>) -> Plan {
    match subscription {
        Some(s) if s.is_active_at(now) => plan(s.plan_name),
        _ => plan(PlanName::Free),
    }
}
