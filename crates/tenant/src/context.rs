//! Active tenant selection.
//!
//! Readers get whole `Arc<Tenant>` snapshots. Switching and settings updates
//! swap the `Arc`, so nobody ever observes a half-replaced tenant.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashsphere_core::{KeyValueStore, Notifier, StorageKeys, TenantId};

use crate::{Limit, Tenant};

/// Default `is_approaching_limit` threshold, in percent.
pub const DEFAULT_APPROACHING_THRESHOLD: u64 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantEvent {
    /// A tenant became current through `set_current` or a restore.
    Selected { tenant_id: TenantId },
    /// Full context reset: everything scoped to `previous` is stale.
    ContextReset {
        previous: Option<TenantId>,
        current: TenantId,
        epoch: u64,
    },
    SettingsUpdated { tenant_id: TenantId },
    Cleared { previous: Option<TenantId> },
}

/// Outcome of [`TenantContext::switch_tenant`].
#[derive(Debug, Clone)]
pub struct TenantSwitch {
    pub previous: Option<Arc<Tenant>>,
    pub current: Arc<Tenant>,
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct TenantState {
    current: Option<Arc<Tenant>>,
    tenants: Vec<Arc<Tenant>>,
    epoch: u64,
}

/// Owns the current tenant, the tenants available to the user and the
/// persisted selection.
pub struct TenantContext {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    approaching_threshold: u64,
    state: RwLock<TenantState>,
    events: Notifier<TenantEvent>,
}

impl core::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TenantContext")
            .field("key", &self.key)
            .field("approaching_threshold", &self.approaching_threshold)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TenantContext {
    pub fn new(storage: Arc<dyn KeyValueStore>, keys: &StorageKeys) -> Self {
        Self {
            storage,
            key: keys.tenant_id.clone(),
            approaching_threshold: DEFAULT_APPROACHING_THRESHOLD,
            state: RwLock::new(TenantState::default()),
            events: Notifier::new(),
        }
    }

    pub fn with_approaching_threshold(mut self, percent: u64) -> Self {
        self.approaching_threshold = percent;
        self
    }

    pub fn approaching_threshold(&self) -> u64 {
        self.approaching_threshold
    }

    fn read(&self) -> RwLockReadGuard<'_, TenantState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TenantState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> dashsphere_core::Subscription<TenantEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn current(&self) -> Option<Arc<Tenant>> {
        self.read().current.clone()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.read().current.as_ref().map(|t| t.id.clone())
    }

    /// Number of completed tenant switches.
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    pub fn tenants(&self) -> Vec<Arc<Tenant>> {
        self.read().tenants.clone()
    }

    pub fn set_tenants(&self, tenants: impl IntoIterator<Item = Tenant>) {
        self.write().tenants = tenants.into_iter().map(Arc::new).collect();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the current tenant and persist its id.
    pub fn set_current(&self, tenant: impl Into<Arc<Tenant>>) -> Arc<Tenant> {
        let tenant = tenant.into();
        {
            let mut st = self.write();
            self.storage.set(&self.key, tenant.id.as_str());
            st.current = Some(tenant.clone());
        }
        tracing::debug!(tenant_id = %tenant.id, "tenant selected");
        self.events.publish(TenantEvent::Selected {
            tenant_id: tenant.id.clone(),
        });
        tenant
    }

    /// Select the persisted tenant if it is one of `known`.
    ///
    /// No-op when a tenant is already current. Returns whether a tenant is
    /// current afterwards.
    pub fn restore_from_persistence(&self, known: &[Arc<Tenant>]) -> bool {
        let restored = {
            let mut st = self.write();
            if st.current.is_some() {
                return true;
            }
            let Some(stored) = self.storage.get(&self.key) else {
                return false;
            };
            match known.iter().find(|t| t.id.as_str() == stored) {
                Some(tenant) => {
                    st.current = Some(tenant.clone());
                    tenant.id.clone()
                }
                None => {
                    tracing::warn!(tenant_id = %stored, "persisted tenant is not available");
                    return false;
                }
            }
        };
        tracing::debug!(tenant_id = %restored, "tenant restored");
        self.events.publish(TenantEvent::Selected {
            tenant_id: restored,
        });
        true
    }

    /// Make `tenant` current and signal a full context reset.
    ///
    /// Anything cached for the previous tenant must be discarded by
    /// subscribers when they receive [`TenantEvent::ContextReset`].
    pub fn switch_tenant(&self, tenant: impl Into<Arc<Tenant>>) -> TenantSwitch {
        let tenant = tenant.into();
        let switch = {
            let mut st = self.write();
            self.storage.set(&self.key, tenant.id.as_str());
            let previous = st.current.replace(tenant.clone());
            st.epoch += 1;
            TenantSwitch {
                previous,
                current: tenant,
                epoch: st.epoch,
            }
        };

        let previous_id = switch.previous.as_ref().map(|t| t.id.clone());
        tracing::info!(
            tenant_id = %switch.current.id,
            previous = ?previous_id.as_ref().map(TenantId::as_str),
            epoch = switch.epoch,
            "tenant switched"
        );
        self.events.publish(TenantEvent::ContextReset {
            previous: previous_id,
            current: switch.current.id.clone(),
            epoch: switch.epoch,
        });
        switch
    }

    /// Select the tenant whose slug is the subdomain of `host`.
    pub fn restore_from_hostname(&self, host: &str) -> bool {
        let Some(slug) = slug_from_hostname(host) else {
            return false;
        };
        let found = self.read().tenants.iter().find(|t| t.slug == slug).cloned();
        match found {
            Some(tenant) => {
                self.set_current(tenant);
                true
            }
            None => {
                tracing::warn!(%slug, "no tenant for subdomain");
                false
            }
        }
    }

    /// Drop the current tenant and purge the persisted selection.
    pub fn clear(&self) {
        let previous = {
            let mut st = self.write();
            self.storage.remove(&self.key);
            st.current.take().map(|t| t.id.clone())
        };
        self.events.publish(TenantEvent::Cleared { previous });
    }

    /// Shallow-merge `settings` into the current tenant's settings.
    ///
    /// Returns `false` when no tenant is current.
    pub fn update_settings(&self, settings: serde_json::Map<String, serde_json::Value>) -> bool {
        let tenant_id = {
            let mut st = self.write();
            let Some(current) = st.current.as_ref() else {
                return false;
            };
            let mut updated = Tenant::clone(current);
            updated.settings.extend(settings);
            let updated = Arc::new(updated);

            if let Some(entry) = st.tenants.iter_mut().find(|t| t.id == updated.id) {
                *entry = updated.clone();
            }
            let tenant_id = updated.id.clone();
            st.current = Some(updated);
            tenant_id
        };
        self.events.publish(TenantEvent::SettingsUpdated { tenant_id });
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Features and limits
    // ─────────────────────────────────────────────────────────────────────

    pub fn has_feature(&self, feature: &str) -> bool {
        self.read()
            .current
            .as_ref()
            .is_some_and(|t| t.has_feature(feature))
    }

    /// Feature gate that also requires the tenant to have a subscription,
    /// whatever its status.
    pub fn can_access_feature(&self, feature: &str) -> bool {
        self.read()
            .current
            .as_ref()
            .is_some_and(|t| t.subscription.is_some() && t.has_feature(feature))
    }

    /// Stricter gate: the subscription must also be active or trialing.
    pub fn can_use_feature(&self, feature: &str) -> bool {
        self.read().current.as_ref().is_some_and(|t| {
            t.subscription.as_ref().is_some_and(|s| s.is_usable()) && t.has_feature(feature)
        })
    }

    fn limit(&self, limit_type: &str) -> Limit {
        self.read()
            .current
            .as_ref()
            .map_or(Limit::Bounded(0), |t| t.limit(limit_type))
    }

    /// `value < limit`, always true when unlimited.
    pub fn is_within_limit(&self, limit_type: &str, value: u64) -> bool {
        self.limit(limit_type).admits(value)
    }

    pub fn usage_percentage(&self, limit_type: &str, value: u64) -> u64 {
        self.limit(limit_type).usage_percentage(value)
    }

    pub fn is_approaching_limit(&self, limit_type: &str, value: u64) -> bool {
        self.usage_percentage(limit_type, value) >= self.approaching_threshold
    }
}

/// Subdomain of a `tenant.domain.tld` host (`acme.example.com` → `acme`).
///
/// Hosts with fewer than three labels have no tenant subdomain.
pub fn slug_from_hostname(host: &str) -> Option<&str> {
    let host = host.trim();
    let host = host.split_once(':').map_or(host, |(name, _)| name);
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 {
        return None;
    }
    labels.first().copied().filter(|slug| !slug.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::{features, limits};
    use crate::{BillingPeriod, PlanType, Subscription, SubscriptionStatus};
    use dashsphere_core::InMemoryKeyValueStore;
    use proptest::prelude::*;
    use serde_json::json;

    fn tenant(id: &str, slug: &str, plan: PlanType) -> Tenant {
        Tenant::for_plan(TenantId::parse(id).unwrap(), slug.to_uppercase(), slug, plan)
    }

    fn context() -> (TenantContext, Arc<InMemoryKeyValueStore>) {
        let storage = Arc::new(InMemoryKeyValueStore::new());
        let ctx = TenantContext::new(storage.clone(), &StorageKeys::default());
        (ctx, storage)
    }

    #[test]
    fn nothing_current_gives_conservative_answers() {
        let (ctx, _) = context();
        assert!(ctx.current().is_none());
        assert!(!ctx.has_feature(features::ANALYTICS));
        assert!(!ctx.is_within_limit(limits::USERS, 0));
        assert_eq!(ctx.usage_percentage(limits::USERS, 0), 100);
    }

    #[test]
    fn set_current_persists_id() {
        let (ctx, storage) = context();
        ctx.set_current(tenant("t1", "acme", PlanType::Starter));
        assert_eq!(storage.get("tenant_id").as_deref(), Some("t1"));
        assert_eq!(ctx.tenant_id(), Some(TenantId::parse("t1").unwrap()));
        assert_eq!(ctx.epoch(), 0);
    }

    #[test]
    fn restore_requires_exact_match() {
        let (ctx, storage) = context();
        let known = vec![
            Arc::new(tenant("t1", "acme", PlanType::Free)),
            Arc::new(tenant("t2", "globex", PlanType::Free)),
        ];

        storage.set("tenant_id", "T2");
        assert!(!ctx.restore_from_persistence(&known));
        assert!(ctx.current().is_none());

        storage.set("tenant_id", "t2");
        assert!(ctx.restore_from_persistence(&known));
        assert_eq!(ctx.current().unwrap().slug, "globex");
    }

    #[test]
    fn restore_is_a_noop_when_already_current() {
        let (ctx, storage) = context();
        ctx.set_current(tenant("t1", "acme", PlanType::Free));
        storage.set("tenant_id", "t2");

        let known = vec![Arc::new(tenant("t2", "globex", PlanType::Free))];
        assert!(ctx.restore_from_persistence(&known));
        assert_eq!(ctx.tenant_id().unwrap().as_str(), "t1");
    }

    #[test]
    fn restore_without_persisted_id_stays_unset() {
        let (ctx, _) = context();
        let known = vec![Arc::new(tenant("t1", "acme", PlanType::Free))];
        assert!(!ctx.restore_from_persistence(&known));
        assert!(ctx.current().is_none());
    }

    #[test]
    fn switch_resets_context_with_epoch() {
        let (ctx, storage) = context();
        let events = ctx.subscribe();
        ctx.set_current(tenant("t1", "acme", PlanType::Free));

        let held = ctx.current().unwrap();
        let switch = ctx.switch_tenant(tenant("t2", "globex", PlanType::Enterprise));

        assert_eq!(switch.epoch, 1);
        assert_eq!(switch.previous.unwrap().id.as_str(), "t1");
        assert_eq!(storage.get("tenant_id").as_deref(), Some("t2"));
        // An old snapshot stays whole.
        assert_eq!(held.slug, "acme");
        assert!(!held.has_feature(features::ANALYTICS));

        assert_eq!(
            events.drain(),
            vec![
                TenantEvent::Selected {
                    tenant_id: TenantId::parse("t1").unwrap()
                },
                TenantEvent::ContextReset {
                    previous: Some(TenantId::parse("t1").unwrap()),
                    current: TenantId::parse("t2").unwrap(),
                    epoch: 1,
                },
            ]
        );
    }

    #[test]
    fn clear_purges_selection() {
        let (ctx, storage) = context();
        ctx.set_current(tenant("t1", "acme", PlanType::Free));
        ctx.clear();
        assert!(ctx.current().is_none());
        assert_eq!(storage.get("tenant_id"), None);
    }

    #[test]
    fn update_settings_is_copy_on_write() {
        let (ctx, _) = context();
        let mut acme = tenant("t1", "acme", PlanType::Free);
        acme.settings.insert("locale".to_string(), json!("en-US"));
        acme.settings.insert("timezone".to_string(), json!("UTC"));
        ctx.set_tenants([acme.clone()]);
        ctx.set_current(acme);
        let before = ctx.current().unwrap();

        let mut patch = serde_json::Map::new();
        patch.insert("locale".to_string(), json!("fr-FR"));
        assert!(ctx.update_settings(patch));

        let after = ctx.current().unwrap();
        assert_eq!(after.settings["locale"], json!("fr-FR"));
        assert_eq!(after.settings["timezone"], json!("UTC"));
        assert_eq!(before.settings["locale"], json!("en-US"));
        assert_eq!(ctx.tenants()[0].settings["locale"], json!("fr-FR"));
    }

    #[test]
    fn update_settings_without_tenant_is_rejected() {
        let (ctx, _) = context();
        assert!(!ctx.update_settings(serde_json::Map::new()));
    }

    #[test]
    fn can_access_feature_needs_any_subscription() {
        let (ctx, _) = context();
        let mut acme = tenant("t1", "acme", PlanType::Starter);
        ctx.set_current(acme.clone());
        assert!(ctx.can_access_feature(features::ANALYTICS));
        assert!(ctx.can_use_feature(features::ANALYTICS));

        acme.subscription = Some(Subscription::new(
            PlanType::Starter,
            SubscriptionStatus::PastDue,
            BillingPeriod::Yearly,
        ));
        ctx.set_current(acme.clone());
        assert!(ctx.can_access_feature(features::ANALYTICS));
        assert!(!ctx.can_access_feature(features::PRIORITY_SUPPORT));

        acme.subscription = None;
        ctx.set_current(acme);
        assert!(ctx.has_feature(features::ANALYTICS));
        assert!(!ctx.can_access_feature(features::ANALYTICS));
    }

    #[test]
    fn can_use_feature_needs_usable_subscription() {
        let (ctx, _) = context();
        let mut acme = tenant("t1", "acme", PlanType::Starter);
        for status in [SubscriptionStatus::PastDue, SubscriptionStatus::Canceled] {
            acme.subscription = Some(Subscription::new(
                PlanType::Starter,
                status,
                BillingPeriod::Monthly,
            ));
            ctx.set_current(acme.clone());
            assert!(ctx.can_access_feature(features::ANALYTICS));
            assert!(!ctx.can_use_feature(features::ANALYTICS));
        }
    }

    #[test]
    fn limits_follow_the_plan() {
        let (ctx, _) = context();
        ctx.set_current(tenant("t1", "acme", PlanType::Starter));

        assert!(ctx.is_within_limit(limits::USERS, 9));
        assert!(!ctx.is_within_limit(limits::USERS, 10));
        assert_eq!(ctx.usage_percentage(limits::USERS, 8), 80);
        assert!(ctx.is_approaching_limit(limits::USERS, 8));
        assert!(!ctx.is_approaching_limit(limits::USERS, 7));
    }

    #[test]
    fn approaching_threshold_is_configurable() {
        let storage = Arc::new(InMemoryKeyValueStore::new());
        let ctx = TenantContext::new(storage, &StorageKeys::default()).with_approaching_threshold(50);
        ctx.set_current(tenant("t1", "acme", PlanType::Starter));
        assert!(ctx.is_approaching_limit(limits::USERS, 5));
    }

    #[test]
    fn unlimited_is_never_approached() {
        let (ctx, _) = context();
        ctx.set_current(tenant("t1", "acme", PlanType::Enterprise));
        assert!(ctx.is_within_limit(limits::API_CALLS, u64::MAX));
        assert_eq!(ctx.usage_percentage(limits::API_CALLS, 1_000_000), 0);
        assert!(!ctx.is_approaching_limit(limits::API_CALLS, 1_000_000));
    }

    #[test]
    fn hostname_slugs() {
        assert_eq!(slug_from_hostname("acme.dashsphere.com"), Some("acme"));
        assert_eq!(slug_from_hostname("acme.dashsphere.com:8443"), Some("acme"));
        assert_eq!(slug_from_hostname("dashsphere.com"), None);
        assert_eq!(slug_from_hostname("localhost"), None);
        assert_eq!(slug_from_hostname(".dashsphere.com"), None);
    }

    #[test]
    fn restore_from_hostname_selects_by_slug() {
        let (ctx, _) = context();
        ctx.set_tenants([
            tenant("t1", "acme", PlanType::Free),
            tenant("t2", "globex", PlanType::Free),
        ]);

        assert!(ctx.restore_from_hostname("globex.dashsphere.com"));
        assert_eq!(ctx.tenant_id().unwrap().as_str(), "t2");
        assert!(!ctx.restore_from_hostname("initech.dashsphere.com"));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn within_limit_is_strictly_below(max in 0u64..1_000_000, value in 0u64..2_000_000) {
            prop_assert_eq!(Limit::Bounded(max).admits(value), value < max);
        }

        #[test]
        fn unlimited_admits_everything(value in any::<u64>()) {
            prop_assert!(Limit::Unlimited.admits(value));
            prop_assert_eq!(Limit::Unlimited.usage_percentage(value), 0);
        }

        #[test]
        fn usage_is_monotonic(max in 1u64..1_000_000, a in 0u64..2_000_000, b in 0u64..2_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let limit = Limit::Bounded(max);
            prop_assert!(limit.usage_percentage(lo) <= limit.usage_percentage(hi));
        }

        #[test]
        fn usage_matches_rounded_ratio(max in 1u64..100_000, value in 0u64..200_000) {
            let expected = ((value as f64 / max as f64) * 100.0).round() as u64;
            let actual = Limit::Bounded(max).usage_percentage(value);
            // Float rounding may land one off at exact halves.
            prop_assert!(actual.abs_diff(expected) <= 1);
        }

        #[test]
        fn half_of_any_even_limit_is_fifty(half in 1u64..1_000_000) {
            prop_assert_eq!(Limit::Bounded(half * 2).usage_percentage(half), 50);
        }

        #[test]
        fn reaching_the_ceiling_means_over_limit(max in 0u64..1_000_000) {
            let limit = Limit::Bounded(max);
            prop_assert!(!limit.admits(max));
            prop_assert!(limit.usage_percentage(max) >= 100);
        }
    }
}
