//! Console configuration.

use serde::Serialize;

use dashsphere_core::StorageKeys;
use dashsphere_tenant::DEFAULT_APPROACHING_THRESHOLD;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_DASHBOARD_ROUTE: &str = "/dashboard";
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

pub const ENV_API_URL: &str = "DASHSPHERE_API_URL";
pub const ENV_STORAGE_PREFIX: &str = "DASHSPHERE_STORAGE_PREFIX";
pub const ENV_APPROACHING_LIMIT_PERCENT: &str = "DASHSPHERE_APPROACHING_LIMIT_PERCENT";
pub const ENV_DASHBOARD_ROUTE: &str = "DASHSPHERE_DASHBOARD_ROUTE";
pub const ENV_LOGIN_ROUTE: &str = "DASHSPHERE_LOGIN_ROUTE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleConfig {
    /// Backend base URL.
    pub api_url: String,
    /// Namespace for persisted keys; empty means the bare key names.
    pub storage_prefix: String,
    /// Usage percentage at which a limit counts as approaching.
    pub approaching_limit_percent: u64,
    /// Where authenticated users land.
    pub dashboard_route: String,
    /// Where anonymous users are sent from protected pages.
    pub login_route: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_prefix: String::new(),
            approaching_limit_percent: DEFAULT_APPROACHING_THRESHOLD,
            dashboard_route: DEFAULT_DASHBOARD_ROUTE.to_string(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Defaults overridden by `DASHSPHERE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    ///
    /// Unusable values are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim();
            if url.is_empty() {
                tracing::warn!(var = ENV_API_URL, "empty value; using default");
            } else {
                config.api_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Some(prefix) = lookup(ENV_STORAGE_PREFIX) {
            config.storage_prefix = prefix.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_APPROACHING_LIMIT_PERCENT) {
            match raw.trim().parse::<u64>() {
                Ok(percent) if (1..=100).contains(&percent) => {
                    config.approaching_limit_percent = percent;
                }
                _ => tracing::warn!(
                    var = ENV_APPROACHING_LIMIT_PERCENT,
                    value = %raw,
                    "expected a percentage in 1..=100; using default"
                ),
            }
        }

        if let Some(route) = route_var(&lookup, ENV_DASHBOARD_ROUTE) {
            config.dashboard_route = route;
        }
        if let Some(route) = route_var(&lookup, ENV_LOGIN_ROUTE) {
            config.login_route = route;
        }

        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_storage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = prefix.into();
        self
    }

    pub fn with_approaching_limit_percent(mut self, percent: u64) -> Self {
        self.approaching_limit_percent = percent;
        self
    }

    pub fn with_dashboard_route(mut self, route: impl Into<String>) -> Self {
        self.dashboard_route = route.into();
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys::with_prefix(&self.storage_prefix)
    }
}

fn route_var(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    let raw = lookup(var)?;
    let route = raw.trim();
    if route.starts_with('/') {
        Some(route.to_string())
    } else {
        tracing::warn!(var, value = %route, "route must start with '/'; using default");
        None
    }
}
