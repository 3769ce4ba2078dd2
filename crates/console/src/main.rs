use anyhow::{Context, bail};

use dashsphere_auth::{AuthorizationEngine, RbacRegistry, RolePermissionTable, RoleHierarchy};
use dashsphere_console::{ConsoleConfig, standard_routes};

/// Dump the console's static configuration as JSON.
///
/// `dashsphere-console [rbac|plans|routes|config]` (default: `rbac`).
fn main() -> anyhow::Result<()> {
    dashsphere_observability::init();

    let config = ConsoleConfig::from_env();
    let engine = AuthorizationEngine::new(RoleHierarchy::standard(), RolePermissionTable::standard())
        .context("invalid role hierarchy or permission table")?;

    let what = std::env::args().nth(1).unwrap_or_else(|| "rbac".to_string());
    let json = match what.as_str() {
        "rbac" => serde_json::to_string_pretty(&RbacRegistry::from_engine(&engine)),
        "plans" => serde_json::to_string_pretty(dashsphere_tenant::plans::catalog()),
        "routes" => serde_json::to_string_pretty(&standard_routes()),
        "config" => serde_json::to_string_pretty(&config),
        other => bail!("unknown section `{other}` (expected rbac, plans, routes or config)"),
    }
    .context("failed to serialize output")?;

    tracing::info!(section = %what, api_url = %config.api_url, "dumping console configuration");
    println!("{json}");
    Ok(())
}
