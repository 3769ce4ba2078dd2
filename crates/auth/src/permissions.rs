use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Role};

/// Permission token of the shape `resource:action` (e.g. `"users:view"`).
///
/// Tokens are opaque: equality is exact string match, with no wildcards and no
/// hierarchy between permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a permission, rejecting tokens that are not `resource:action`.
    pub fn parse(name: impl Into<Cow<'static, str>>) -> Result<Self, ConfigError> {
        let permission = Self::new(name);
        if permission.is_well_formed() {
            Ok(permission)
        } else {
            Err(ConfigError::MalformedPermission(permission.as_str().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(resource, _)| resource)
    }

    pub fn action(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(_, action)| action)
    }

    fn is_well_formed(&self) -> bool {
        match self.as_str().split_once(':') {
            Some((resource, action)) => {
                !resource.is_empty()
                    && !action.is_empty()
                    && !action.contains(':')
                    && !self.as_str().contains(char::is_whitespace)
            }
            None => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permission catalogue of the console.
pub mod catalog {
    use super::Permission;

    pub const USERS_VIEW: Permission = Permission::from_static("users:view");
    pub const USERS_CREATE: Permission = Permission::from_static("users:create");
    pub const USERS_EDIT: Permission = Permission::from_static("users:edit");
    pub const USERS_DELETE: Permission = Permission::from_static("users:delete");

    pub const ROLES_VIEW: Permission = Permission::from_static("roles:view");
    pub const ROLES_CREATE: Permission = Permission::from_static("roles:create");
    pub const ROLES_EDIT: Permission = Permission::from_static("roles:edit");
    pub const ROLES_DELETE: Permission = Permission::from_static("roles:delete");

    pub const TENANTS_VIEW: Permission = Permission::from_static("tenants:view");
    pub const TENANTS_CREATE: Permission = Permission::from_static("tenants:create");
    pub const TENANTS_EDIT: Permission = Permission::from_static("tenants:edit");
    pub const TENANTS_DELETE: Permission = Permission::from_static("tenants:delete");

    pub const SETTINGS_VIEW: Permission = Permission::from_static("settings:view");
    pub const SETTINGS_EDIT: Permission = Permission::from_static("settings:edit");

    pub const BILLING_VIEW: Permission = Permission::from_static("billing:view");
    pub const BILLING_MANAGE: Permission = Permission::from_static("billing:manage");

    pub const ANALYTICS_VIEW: Permission = Permission::from_static("analytics:view");
    pub const ANALYTICS_EXPORT: Permission = Permission::from_static("analytics:export");

    pub const INTEGRATIONS_VIEW: Permission = Permission::from_static("integrations:view");
    pub const INTEGRATIONS_MANAGE: Permission = Permission::from_static("integrations:manage");

    pub const AUDIT_LOGS_VIEW: Permission = Permission::from_static("audit_logs:view");

    pub const NOTIFICATIONS_VIEW: Permission = Permission::from_static("notifications:view");
    pub const NOTIFICATIONS_MANAGE: Permission = Permission::from_static("notifications:manage");

    pub const ALL: &[Permission] = &[
        USERS_VIEW,
        USERS_CREATE,
        USERS_EDIT,
        USERS_DELETE,
        ROLES_VIEW,
        ROLES_CREATE,
        ROLES_EDIT,
        ROLES_DELETE,
        TENANTS_VIEW,
        TENANTS_CREATE,
        TENANTS_EDIT,
        TENANTS_DELETE,
        SETTINGS_VIEW,
        SETTINGS_EDIT,
        BILLING_VIEW,
        BILLING_MANAGE,
        ANALYTICS_VIEW,
        ANALYTICS_EXPORT,
        INTEGRATIONS_VIEW,
        INTEGRATIONS_MANAGE,
        AUDIT_LOGS_VIEW,
        NOTIFICATIONS_VIEW,
        NOTIFICATIONS_MANAGE,
    ];
}

/// Permissions granted directly to each role.
///
/// Lookups are per role: a role's entry is NOT unioned with its ancestors'
/// entries. Every role must have an entry (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionTable {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl RolePermissionTable {
    pub fn new(
        entries: impl IntoIterator<Item = (Role, Vec<Permission>)>,
    ) -> Result<Self, ConfigError> {
        let mut grants: HashMap<Role, HashSet<Permission>> = HashMap::new();
        for (role, permissions) in entries {
            let set = grants.entry(role).or_default();
            for permission in permissions {
                if !permission.is_well_formed() {
                    return Err(ConfigError::MalformedPermission(permission.as_str().to_string()));
                }
                set.insert(permission);
            }
        }

        if let Some(missing) = Role::ALL.into_iter().find(|role| !grants.contains_key(role)) {
            return Err(ConfigError::MissingRole(missing));
        }

        Ok(Self { grants })
    }

    /// The console's default grants.
    pub fn standard() -> Self {
        use catalog::*;

        let table = [
            (Role::SuperAdmin, ALL.to_vec()),
            (
                Role::TenantOwner,
                vec![
                    USERS_VIEW,
                    USERS_CREATE,
                    USERS_EDIT,
                    USERS_DELETE,
                    ROLES_VIEW,
                    ROLES_CREATE,
                    ROLES_EDIT,
                    SETTINGS_VIEW,
                    SETTINGS_EDIT,
                    BILLING_VIEW,
                    BILLING_MANAGE,
                    ANALYTICS_VIEW,
                    ANALYTICS_EXPORT,
                    INTEGRATIONS_VIEW,
                    INTEGRATIONS_MANAGE,
                    AUDIT_LOGS_VIEW,
                    NOTIFICATIONS_VIEW,
                    NOTIFICATIONS_MANAGE,
                ],
            ),
            (
                Role::TenantAdmin,
                vec![
                    USERS_VIEW,
                    USERS_CREATE,
                    USERS_EDIT,
                    ROLES_VIEW,
                    SETTINGS_VIEW,
                    SETTINGS_EDIT,
                    BILLING_VIEW,
                    BILLING_MANAGE,
                    ANALYTICS_VIEW,
                    INTEGRATIONS_VIEW,
                    AUDIT_LOGS_VIEW,
                    NOTIFICATIONS_VIEW,
                ],
            ),
            (
                Role::Manager,
                vec![USERS_VIEW, ANALYTICS_VIEW, SETTINGS_VIEW, NOTIFICATIONS_VIEW],
            ),
            (
                Role::User,
                vec![SETTINGS_VIEW, ANALYTICS_VIEW, NOTIFICATIONS_VIEW],
            ),
            (Role::Viewer, vec![ANALYTICS_VIEW, NOTIFICATIONS_VIEW]),
            (Role::Guest, vec![NOTIFICATIONS_VIEW]),
        ];

        Self {
            grants: table
                .into_iter()
                .map(|(role, perms)| (role, perms.into_iter().collect()))
                .collect(),
        }
    }

    pub fn grants(&self, role: Role, permission: &Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|set| set.contains(permission))
    }

    /// Permissions listed for `role`, sorted.
    pub fn permissions_for(&self, role: Role) -> BTreeSet<Permission> {
        self.grants
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Roles whose entry lists `permission`, in declaration order of [`Role::ALL`].
    pub fn roles_granting(&self, permission: &Permission) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.grants(*role, permission))
            .collect()
    }

    /// Every permission mentioned anywhere in the table.
    pub fn all_permissions(&self) -> BTreeSet<Permission> {
        self.grants.values().flatten().cloned().collect()
    }
}

impl Default for RolePermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}
