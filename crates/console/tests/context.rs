mod common;

use dashsphere_console::{ConsoleConfig, TenantMismatch};
use dashsphere_core::KeyValueStore;
use dashsphere_tenant::TenantEvent;
use dashsphere_tenant::plans::limits;

use common::{ADMIN, ROOT, fixture, fixture_with, tenant_id};

#[tokio::test]
async fn logout_drops_session_and_tenant() {
    let f = fixture();
    f.login(ADMIN).await;
    f.select("t1");
    let keys = f.ctx.config().storage_keys();
    f.storage.set(&keys.theme, "dark");

    f.ctx.logout();

    assert!(!f.ctx.session().is_authenticated());
    assert!(f.ctx.tenant().current().is_none());
    assert_eq!(f.storage.get(&keys.access_token), None);
    assert_eq!(f.storage.get(&keys.tenant_id), None);
    assert_eq!(f.storage.get(&keys.theme).as_deref(), Some("dark"));
}

#[tokio::test]
async fn session_logout_alone_drops_the_tenant() {
    let f = fixture();
    f.login(ADMIN).await;
    f.select("t1");
    let events = f.ctx.tenant().subscribe();

    f.ctx.session().logout();

    assert!(f.ctx.tenant().current().is_none());
    assert_eq!(
        events.drain(),
        vec![TenantEvent::Cleared {
            previous: Some(tenant_id("t1")),
        }]
    );

    f.login(ROOT).await;
    assert_eq!(f.ctx.tenant().tenant_id(), None);
}

#[tokio::test]
async fn login_over_a_session_does_not_inherit_its_tenant() {
    let f = fixture();
    f.login(ADMIN).await;
    f.select("t1");

    f.login(ROOT).await;

    assert_eq!(f.ctx.tenant().tenant_id(), None);
    assert_eq!(f.ctx.tenant_mismatch(), None);
}

#[tokio::test]
async fn mismatch_is_reported_not_enforced() {
    let f = fixture();
    assert_eq!(f.ctx.tenant_mismatch(), None);

    f.login(ADMIN).await;
    f.select("t1");
    assert_eq!(f.ctx.tenant_mismatch(), None);

    f.select("t2");
    assert_eq!(
        f.ctx.tenant_mismatch(),
        Some(TenantMismatch {
            affiliated: Some(tenant_id("t1")),
            current: tenant_id("t2"),
        })
    );
    assert_eq!(f.ctx.tenant().tenant_id(), Some(tenant_id("t2")));
}

#[tokio::test]
async fn unaffiliated_principal_mismatches_any_tenant() {
    let f = fixture();
    f.login(ROOT).await;
    f.select("t1");
    assert_eq!(
        f.ctx.tenant_mismatch(),
        Some(TenantMismatch {
            affiliated: None,
            current: tenant_id("t1"),
        })
    );
}

#[tokio::test]
async fn storage_prefix_namespaces_every_key() {
    let f = fixture_with(ConsoleConfig::default().with_storage_prefix("ds"));
    f.login(ADMIN).await;
    f.select("t1");

    assert!(f.storage.get("ds.auth_token").is_some());
    assert!(f.storage.get("ds.refresh_token").is_some());
    assert_eq!(f.storage.get("ds.tenant_id").as_deref(), Some("t1"));
    assert_eq!(f.storage.get("auth_token"), None);
}

#[tokio::test]
async fn approaching_threshold_comes_from_config() {
    let f = fixture_with(ConsoleConfig::default().with_approaching_limit_percent(50));
    f.select("t2");

    // Starter: 10 users.
    assert!(f.ctx.tenant().is_approaching_limit(limits::USERS, 5));
    assert!(!f.ctx.tenant().is_approaching_limit(limits::USERS, 4));
}

#[tokio::test]
async fn switching_tenant_broadcasts_a_reset() {
    let f = fixture();
    f.login(ADMIN).await;
    f.select("t1");
    let events = f.ctx.tenant().subscribe();

    let globex = f.ctx.tenant().tenants()[1].clone();
    let switch = f.ctx.tenant().switch_tenant(globex);

    assert_eq!(switch.current.slug, "globex");
    assert_eq!(
        events.drain(),
        vec![TenantEvent::ContextReset {
            previous: Some(tenant_id("t1")),
            current: tenant_id("t2"),
            epoch: 1,
        }]
    );
}
