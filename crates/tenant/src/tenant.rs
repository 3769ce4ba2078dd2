use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dashsphere_core::{CoreError, TenantId};

use crate::{BillingPeriod, PlanType};

/// Wire value for an unlimited ceiling.
pub const UNLIMITED: i64 = -1;

/// Usage ceiling of a tenant resource.
///
/// Serialized as a plain integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Limit {
    Bounded(u64),
    Unlimited,
}

impl Limit {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// Whether `value` is strictly below the ceiling.
    pub fn admits(&self, value: u64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Bounded(max) => value < *max,
        }
    }

    /// `value` as a rounded percentage of the ceiling.
    ///
    /// `0` when unlimited; `100` for a zero ceiling.
    pub fn usage_percentage(&self, value: u64) -> u64 {
        match *self {
            Limit::Unlimited => 0,
            Limit::Bounded(0) => 100,
            Limit::Bounded(max) => {
                // Round half up without floating point.
                let max = u128::from(max);
                let scaled = (u128::from(value) * 200 + max) / (max * 2);
                u64::try_from(scaled).unwrap_or(u64::MAX)
            }
        }
    }
}

impl TryFrom<i64> for Limit {
    type Error = CoreError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            UNLIMITED => Ok(Limit::Unlimited),
            n if n >= 0 => Ok(Limit::Bounded(n.unsigned_abs())),
            n => Err(CoreError::validation(format!(
                "limit must be >= 0 or {UNLIMITED}, got {n}"
            ))),
        }
    }
}

impl From<Limit> for i64 {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Unlimited => UNLIMITED,
            Limit::Bounded(max) => i64::try_from(max).unwrap_or(i64::MAX),
        }
    }
}

impl core::fmt::Display for Limit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Limit::Unlimited => f.write_str("unlimited"),
            Limit::Bounded(max) => write!(f, "{max}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Expired,
}

/// Billing state of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: PlanType,
    pub status: SubscriptionStatus,
    pub billing_period: BillingPeriod,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn new(plan: PlanType, status: SubscriptionStatus, billing_period: BillingPeriod) -> Self {
        Self {
            plan,
            status,
            billing_period,
            current_period_end: None,
        }
    }

    /// Active and trialing subscriptions unlock plan features.
    pub fn is_usable(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

/// An isolated organization context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub features: BTreeSet<String>,
    #[serde(default)]
    pub limits: BTreeMap<String, Limit>,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl Tenant {
    pub fn new(id: TenantId, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
            settings: serde_json::Map::new(),
            features: BTreeSet::new(),
            limits: BTreeMap::new(),
            subscription: None,
        }
    }

    /// Tenant on an active monthly `plan`, with the plan's limits and features.
    ///
    /// [`PlanType::Custom`] has no catalog entry: limits and features start empty.
    pub fn for_plan(
        id: TenantId,
        name: impl Into<String>,
        slug: impl Into<String>,
        plan: PlanType,
    ) -> Self {
        let mut tenant = Self::new(id, name, slug).with_subscription(Subscription::new(
            plan,
            SubscriptionStatus::Active,
            BillingPeriod::Monthly,
        ));
        if let Some(def) = plan.definition() {
            tenant.limits = def.limits();
            tenant.features = def.features();
        }
        tenant
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    pub fn with_limit(mut self, limit_type: impl Into<String>, limit: Limit) -> Self {
        self.limits.insert(limit_type.into(), limit);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Ceiling for `limit_type`; an absent entry counts as `Bounded(0)`.
    pub fn limit(&self, limit_type: &str) -> Limit {
        self.limits
            .get(limit_type)
            .copied()
            .unwrap_or(Limit::Bounded(0))
    }
}
