//! Subscription plan catalog.

use core::str::FromStr;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use dashsphere_core::CoreError;

use crate::Limit;

/// Limit keys understood by the console.
pub mod limits {
    pub const USERS: &str = "users";
    /// Gigabytes.
    pub const STORAGE: &str = "storage";
    /// Per month.
    pub const API_CALLS: &str = "api_calls";
}

/// Feature tokens granted by plan capabilities.
pub mod features {
    pub const ANALYTICS: &str = "analytics";
    pub const INTEGRATIONS: &str = "integrations";
    pub const CUSTOM_BRANDING: &str = "custom_branding";
    pub const PRIORITY_SUPPORT: &str = "priority_support";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    Starter,
    Professional,
    Enterprise,
    /// Negotiated per tenant; not in the catalog.
    Custom,
}

impl PlanType {
    pub const ALL: [PlanType; 5] = [
        PlanType::Free,
        PlanType::Starter,
        PlanType::Professional,
        PlanType::Enterprise,
        PlanType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Starter => "starter",
            PlanType::Professional => "professional",
            PlanType::Enterprise => "enterprise",
            PlanType::Custom => "custom",
        }
    }

    /// Catalog entry for this plan; `None` for [`PlanType::Custom`].
    pub fn definition(&self) -> Option<&'static PlanDefinition> {
        CATALOG.iter().find(|def| def.plan == *self)
    }
}

impl core::fmt::Display for PlanType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanType::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("unknown plan: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
    Lifetime,
}

/// Catalog entry: price, ceilings and capabilities of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanDefinition {
    pub plan: PlanType,
    pub name: &'static str,
    /// USD per month.
    pub monthly_price: u32,
    pub max_users: Limit,
    pub max_storage_gb: Limit,
    pub max_api_calls: Limit,
    pub analytics: bool,
    pub integrations: bool,
    pub custom_branding: bool,
    pub priority_support: bool,
    /// Marketing bullet points.
    pub highlights: &'static [&'static str],
}

impl PlanDefinition {
    /// Limits keyed by [`limits`] names.
    pub fn limits(&self) -> BTreeMap<String, Limit> {
        BTreeMap::from([
            (limits::USERS.to_string(), self.max_users),
            (limits::STORAGE.to_string(), self.max_storage_gb),
            (limits::API_CALLS.to_string(), self.max_api_calls),
        ])
    }

    /// Feature tokens for every enabled capability.
    pub fn features(&self) -> BTreeSet<String> {
        [
            (self.analytics, features::ANALYTICS),
            (self.integrations, features::INTEGRATIONS),
            (self.custom_branding, features::CUSTOM_BRANDING),
            (self.priority_support, features::PRIORITY_SUPPORT),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, token)| token.to_string())
        .collect()
    }
}

/// Every catalog plan, cheapest first.
pub fn catalog() -> &'static [PlanDefinition] {
    &CATALOG
}

static CATALOG: [PlanDefinition; 4] = [
    PlanDefinition {
        plan: PlanType::Free,
        name: "Free",
        monthly_price: 0,
        max_users: Limit::Bounded(3),
        max_storage_gb: Limit::Bounded(1),
        max_api_calls: Limit::Bounded(1_000),
        analytics: false,
        integrations: false,
        custom_branding: false,
        priority_support: false,
        highlights: &[
            "Up to 3 users",
            "1GB storage",
            "1,000 API calls/month",
            "Basic dashboard",
            "Email support",
        ],
    },
    PlanDefinition {
        plan: PlanType::Starter,
        name: "Starter",
        monthly_price: 29,
        max_users: Limit::Bounded(10),
        max_storage_gb: Limit::Bounded(10),
        max_api_calls: Limit::Bounded(10_000),
        analytics: true,
        integrations: true,
        custom_branding: false,
        priority_support: false,
        highlights: &[
            "Up to 10 users",
            "10GB storage",
            "10,000 API calls/month",
            "Advanced analytics",
            "Basic integrations",
            "Email support",
        ],
    },
    PlanDefinition {
        plan: PlanType::Professional,
        name: "Professional",
        monthly_price: 99,
        max_users: Limit::Bounded(50),
        max_storage_gb: Limit::Bounded(100),
        max_api_calls: Limit::Bounded(100_000),
        analytics: true,
        integrations: true,
        custom_branding: true,
        priority_support: true,
        highlights: &[
            "Up to 50 users",
            "100GB storage",
            "100,000 API calls/month",
            "Advanced analytics",
            "All integrations",
            "Custom branding",
            "Priority support",
            "API access",
        ],
    },
    PlanDefinition {
        plan: PlanType::Enterprise,
        name: "Enterprise",
        monthly_price: 299,
        max_users: Limit::Unlimited,
        max_storage_gb: Limit::Unlimited,
        max_api_calls: Limit::Unlimited,
        analytics: true,
        integrations: true,
        custom_branding: true,
        priority_support: true,
        highlights: &[
            "Unlimited users",
            "Unlimited storage",
            "Unlimited API calls",
            "Advanced analytics",
            "All integrations",
            "Custom branding",
            "Dedicated support",
            "SLA guarantee",
            "Custom features",
        ],
    },
];
