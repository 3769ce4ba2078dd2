//! Tenant context: the active organization, its plan, features and limits.

pub mod context;
pub mod plans;
pub mod tenant;

pub use context::{
    DEFAULT_APPROACHING_THRESHOLD, TenantContext, TenantEvent, TenantSwitch, slug_from_hostname,
};
pub use plans::{BillingPeriod, PlanDefinition, PlanType};
pub use tenant::{Limit, Subscription, SubscriptionStatus, Tenant, UNLIMITED};
