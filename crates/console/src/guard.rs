//! Navigation guard.
//!
//! Checks run in a fixed order: restore, authentication, guest-only pages,
//! permissions, tenant requirement.

use serde::Serialize;

use dashsphere_auth::{Permission, catalog};

use crate::ConsoleContext;

/// Route metadata consulted by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub name: String,
    pub path: String,
    pub requires_auth: bool,
    /// Pages only anonymous users should see (login, register).
    pub guest_only: bool,
    /// Any one of these grants access; empty means no permission check.
    pub permissions: Vec<Permission>,
    pub requires_tenant: bool,
    pub title: Option<String>,
}

impl Route {
    fn with_auth(name: &str, path: &str, requires_auth: bool) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            requires_auth,
            guest_only: false,
            permissions: Vec::new(),
            requires_tenant: false,
            title: None,
        }
    }

    pub fn public(name: &str, path: &str) -> Self {
        Self::with_auth(name, path, false)
    }

    pub fn protected(name: &str, path: &str) -> Self {
        Self::with_auth(name, path, true)
    }

    pub fn guest(name: &str, path: &str) -> Self {
        Self {
            guest_only: true,
            ..Self::public(name, path)
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    pub fn requiring_tenant(mut self) -> Self {
        self.requires_tenant = true;
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// The console's route table.
pub fn standard_routes() -> Vec<Route> {
    vec![
        Route::guest("login", "/login"),
        Route::guest("register", "/register"),
        Route::public("forgot_password", "/forgot-password"),
        Route::protected("dashboard", "/dashboard").titled("Dashboard"),
        Route::protected("analytics", "/analytics")
            .with_permissions([catalog::ANALYTICS_VIEW])
            .requiring_tenant()
            .titled("Analytics"),
        Route::protected("notifications", "/notifications").titled("Notifications"),
        Route::protected("users", "/users")
            .with_permissions([catalog::USERS_VIEW])
            .requiring_tenant()
            .titled("Users"),
        Route::protected("tenants", "/tenants")
            .with_permissions([catalog::TENANTS_VIEW])
            .titled("Tenants"),
        Route::protected("billing", "/billing")
            .with_permissions([catalog::BILLING_VIEW])
            .requiring_tenant()
            .titled("Billing & Subscription"),
        Route::protected("integrations", "/integrations")
            .with_permissions([catalog::INTEGRATIONS_VIEW])
            .requiring_tenant()
            .titled("Integrations"),
        Route::protected("profile", "/profile").titled("Profile"),
        Route::protected("settings", "/settings")
            .with_permissions([catalog::SETTINGS_VIEW])
            .requiring_tenant()
            .titled("Settings"),
        Route::public("unauthorized", "/unauthorized"),
    ]
}

/// Guard verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Navigation {
    Proceed,
    /// `to` is the configured login route.
    RedirectToLogin { to: String, return_to: String },
    Redirect { to: String },
    Unauthorized,
}

pub struct RouteGuard<'a> {
    context: &'a ConsoleContext,
}

impl<'a> RouteGuard<'a> {
    pub fn new(context: &'a ConsoleContext) -> Self {
        Self { context }
    }

    /// Decide whether navigating to `route` (reached as `full_path`) may proceed.
    pub async fn check(&self, route: &Route, full_path: &str) -> Navigation {
        let session = self.context.session();
        let tenant = self.context.tenant();
        let config = self.context.config();

        if route.requires_auth && !session.is_authenticated() {
            session.restore_from_persistence().await;
        }
        if tenant.current().is_none() {
            tenant.restore_from_persistence(&tenant.tenants());
        }

        let authenticated = session.is_authenticated();

        if route.requires_auth && !authenticated {
            tracing::debug!(route = %route.name, "not authenticated; redirecting to login");
            return Navigation::RedirectToLogin {
                to: config.login_route.clone(),
                return_to: full_path.to_string(),
            };
        }

        if route.guest_only && authenticated {
            return Navigation::Redirect {
                to: config.dashboard_route.clone(),
            };
        }

        if route.requires_auth
            && !route.permissions.is_empty()
            && !session.has_any_permission(&route.permissions)
        {
            if let Some(first) = route.permissions.first() {
                let explanation = session.explain(first);
                tracing::debug!(route = %route.name, reason = %explanation.reason, "navigation denied");
            }
            return Navigation::Unauthorized;
        }

        if route.requires_auth && route.requires_tenant && tenant.current().is_none() {
            tracing::debug!(route = %route.name, "no tenant selected");
            return Navigation::Redirect {
                to: config.dashboard_route.clone(),
            };
        }

        Navigation::Proceed
    }
}
