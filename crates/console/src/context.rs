//! Composition root: one session and one tenant context, passed explicitly.

use std::sync::Arc;

use dashsphere_auth::AuthorizationEngine;
use dashsphere_core::{KeyValueStore, TenantId};
use dashsphere_session::{Authenticator, IdentitySession};
use dashsphere_tenant::TenantContext;

use crate::{ConsoleConfig, RouteGuard};

/// Principal's affiliation disagrees with the selected tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantMismatch {
    pub affiliated: Option<TenantId>,
    pub current: TenantId,
}

#[derive(Debug)]
pub struct ConsoleContext {
    config: ConsoleConfig,
    session: IdentitySession,
    tenant: Arc<TenantContext>,
}

impl ConsoleContext {
    pub fn new(
        config: ConsoleConfig,
        engine: AuthorizationEngine,
        authenticator: impl Authenticator + 'static,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let keys = config.storage_keys();
        let tenant = Arc::new(
            TenantContext::new(storage.clone(), &keys)
                .with_approaching_threshold(config.approaching_limit_percent),
        );
        // However the session ends, the tenant selection goes with it.
        let selection = tenant.clone();
        let session = IdentitySession::new(Arc::new(engine), authenticator, storage, keys)
            .with_session_end_hook(move || selection.clear());

        Self {
            config,
            session,
            tenant,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> &IdentitySession {
        &self.session
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn guard(&self) -> RouteGuard<'_> {
        RouteGuard::new(self)
    }

    /// End the session. The tenant selection is dropped with it.
    pub fn logout(&self) {
        self.session.logout();
    }

    /// `Some` when a principal and a tenant are both present and the
    /// principal is not affiliated with that tenant.
    ///
    /// Nothing is enforced here; callers decide whether to switch, warn or
    /// log out.
    pub fn tenant_mismatch(&self) -> Option<TenantMismatch> {
        let principal = self.session.principal()?;
        let current = self.tenant.tenant_id()?;
        if principal.is_own_tenant(&current) {
            return None;
        }
        Some(TenantMismatch {
            affiliated: principal.tenant_id,
            current,
        })
    }
}
