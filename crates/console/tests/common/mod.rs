#![allow(dead_code)]

use std::sync::Arc;

use dashsphere_auth::{AuthorizationEngine, Principal, Role};
use dashsphere_console::{ConsoleConfig, ConsoleContext, Route, standard_routes};
use dashsphere_core::{InMemoryKeyValueStore, TenantId, UserId};
use dashsphere_session::{Credentials, InMemoryAuthenticator};
use dashsphere_tenant::{PlanType, Tenant};

pub const PASSWORD: &str = "correct horse";
pub const ADMIN: &str = "admin@acme.test";
pub const VIEWER: &str = "viewer@acme.test";
pub const ROOT: &str = "root@dashsphere.test";

pub struct Fixture {
    pub ctx: Arc<ConsoleContext>,
    pub backend: Arc<InMemoryAuthenticator>,
    pub storage: Arc<InMemoryKeyValueStore>,
}

impl Fixture {
    /// A second console over the same storage and backend, as after a reload.
    pub fn reload(&self) -> Fixture {
        let ctx = ConsoleContext::new(
            self.ctx.config().clone(),
            AuthorizationEngine::standard(),
            self.backend.clone(),
            self.storage.clone(),
        );
        ctx.tenant().set_tenants(tenants());
        Fixture {
            ctx: Arc::new(ctx),
            backend: self.backend.clone(),
            storage: self.storage.clone(),
        }
    }

    pub async fn login(&self, email: &str) {
        self.ctx
            .session()
            .login(&Credentials::new(email, PASSWORD))
            .await
            .expect("fixture login");
    }

    pub fn select(&self, tenant_id: &str) {
        let tenant = self
            .ctx
            .tenant()
            .tenants()
            .into_iter()
            .find(|t| t.id.as_str() == tenant_id)
            .expect("fixture tenant");
        self.ctx.tenant().set_current(tenant);
    }
}

pub fn tenant_id(id: &str) -> TenantId {
    TenantId::parse(id).unwrap()
}

pub fn tenants() -> Vec<Tenant> {
    vec![
        Tenant::for_plan(tenant_id("t1"), "Acme", "acme", PlanType::Professional),
        Tenant::for_plan(tenant_id("t2"), "Globex", "globex", PlanType::Starter),
    ]
}

fn account(id: &str, name: &str, email: &str, role: Role, tenant: Option<&str>) -> Principal {
    let principal = Principal::new(UserId::parse(id).unwrap(), name, email, role);
    match tenant {
        Some(t) => principal.with_tenant(tenant_id(t)),
        None => principal,
    }
}

pub fn fixture_with(config: ConsoleConfig) -> Fixture {
    let backend = Arc::new(
        InMemoryAuthenticator::new()
            .with_account(PASSWORD, account("1", "Ada", ADMIN, Role::TenantAdmin, Some("t1")))
            .with_account(PASSWORD, account("2", "Vic", VIEWER, Role::Viewer, Some("t1")))
            .with_account(PASSWORD, account("3", "Root", ROOT, Role::SuperAdmin, None)),
    );
    let storage = Arc::new(InMemoryKeyValueStore::new());
    let ctx = ConsoleContext::new(
        config,
        AuthorizationEngine::standard(),
        backend.clone(),
        storage.clone(),
    );
    ctx.tenant().set_tenants(tenants());

    Fixture {
        ctx: Arc::new(ctx),
        backend,
        storage,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(ConsoleConfig::default())
}

pub fn route(name: &str) -> Route {
    standard_routes()
        .into_iter()
        .find(|r| r.name == name)
        .expect("known route")
}
