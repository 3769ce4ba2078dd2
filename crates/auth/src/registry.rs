//! Read-only view of the RBAC model for the roles/permissions admin screens.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{AuthorizationEngine, Permission, Role};

/// Role definition with its parent and granted permissions.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: Role,
    pub description: String,
    pub inherits_from: Option<Role>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub category: Option<String>,
    pub action: Option<String>,
    pub granted_to: Vec<Role>,
}

/// Registry of every role and permission known to an engine.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: BTreeMap<Role, RoleDefinition>,
    pub permissions: BTreeMap<String, PermissionDefinition>,
}

impl RbacRegistry {
    pub fn from_engine(engine: &AuthorizationEngine) -> Self {
        let table = engine.table();

        let roles = Role::ALL
            .into_iter()
            .map(|role| {
                let definition = RoleDefinition {
                    name: role,
                    description: role.description().to_string(),
                    inherits_from: engine.hierarchy().parent(role),
                    permissions: table
                        .permissions_for(role)
                        .iter()
                        .map(|p| p.as_str().to_string())
                        .collect(),
                };
                (role, definition)
            })
            .collect();

        let permissions = table
            .all_permissions()
            .into_iter()
            .map(|permission| {
                let definition = describe(&permission, table.roles_granting(&permission));
                (permission.as_str().to_string(), definition)
            })
            .collect();

        Self { roles, permissions }
    }

    /// Permissions grouped by category (the token's resource part).
    pub fn by_category(&self) -> BTreeMap<String, Vec<&PermissionDefinition>> {
        let mut grouped: BTreeMap<String, Vec<&PermissionDefinition>> = BTreeMap::new();
        for definition in self.permissions.values() {
            let category = definition.category.clone().unwrap_or_else(|| "other".to_string());
            grouped.entry(category).or_default().push(definition);
        }
        grouped
    }
}

fn describe(permission: &Permission, granted_to: Vec<Role>) -> PermissionDefinition {
    PermissionDefinition {
        name: permission.as_str().to_string(),
        category: permission.resource().map(str::to_string),
        action: permission.action().map(str::to_string),
        granted_to,
    }
}
