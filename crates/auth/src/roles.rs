use core::str::FromStr;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Role assigned to a principal.
///
/// The set is closed and fixed at build time. The string form is the
/// snake_case name used by the backend (`"tenant_admin"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform-level access across every tenant.
    SuperAdmin,
    TenantOwner,
    TenantAdmin,
    /// Department/team manager.
    Manager,
    User,
    /// Read-only access.
    Viewer,
    Guest,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SuperAdmin,
        Role::TenantOwner,
        Role::TenantAdmin,
        Role::Manager,
        Role::User,
        Role::Viewer,
        Role::Guest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::TenantOwner => "tenant_owner",
            Role::TenantAdmin => "tenant_admin",
            Role::Manager => "manager",
            Role::User => "user",
            Role::Viewer => "viewer",
            Role::Guest => "guest",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Platform administrator with access to every tenant",
            Role::TenantOwner => "Full access within the owned tenant",
            Role::TenantAdmin => "Administrator within a tenant",
            Role::Manager => "Department or team manager",
            Role::User => "Standard user",
            Role::Viewer => "Read-only access",
            Role::Guest => "Limited guest access",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownRole(s.to_string()))
    }
}

/// Single-parent inheritance between roles.
///
/// Each role inherits from at most one parent; the whole relation is a forest.
/// Instances are validated on construction, so ancestry walks always
/// terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleHierarchy {
    parents: HashMap<Role, Role>,
}

impl RoleHierarchy {
    /// Build a hierarchy from `(child, parent)` edges.
    pub fn new(edges: impl IntoIterator<Item = (Role, Role)>) -> Result<Self, ConfigError> {
        let mut parents: HashMap<Role, Role> = HashMap::new();
        for (child, parent) in edges {
            match parents.get(&child) {
                Some(existing) if *existing != parent => {
                    return Err(ConfigError::MultipleParents {
                        role: child,
                        first: *existing,
                        second: parent,
                    });
                }
                _ => {
                    parents.insert(child, parent);
                }
            }
        }

        let hierarchy = Self { parents };
        hierarchy.validate()?;
        Ok(hierarchy)
    }

    /// Skips validation so broken hierarchies can be exercised.
    #[cfg(test)]
    pub(crate) fn unchecked(edges: impl IntoIterator<Item = (Role, Role)>) -> Self {
        Self {
            parents: edges.into_iter().collect(),
        }
    }

    /// `super_admin → tenant_owner → tenant_admin → manager → user → viewer`;
    /// `guest` stands alone.
    pub fn standard() -> Self {
        Self {
            parents: HashMap::from([
                (Role::SuperAdmin, Role::TenantOwner),
                (Role::TenantOwner, Role::TenantAdmin),
                (Role::TenantAdmin, Role::Manager),
                (Role::Manager, Role::User),
                (Role::User, Role::Viewer),
            ]),
        }
    }

    pub fn parent(&self, role: Role) -> Option<Role> {
        self.parents.get(&role).copied()
    }

    /// Ancestors of `role`, nearest first. The role itself is not included.
    ///
    /// The walk is bounded by the number of distinct roles.
    pub fn ancestors(&self, role: Role) -> Result<Vec<Role>, ConfigError> {
        let mut chain = Vec::new();
        let mut current = role;

        for _ in 0..Role::ALL.len() {
            let Some(parent) = self.parent(current) else {
                return Ok(chain);
            };
            if parent == role || chain.contains(&parent) {
                return Err(ConfigError::HierarchyCycle(parent));
            }
            chain.push(parent);
            current = parent;
        }

        if self.parent(current).is_none() {
            Ok(chain)
        } else {
            Err(ConfigError::DepthExceeded(role))
        }
    }

    /// True iff `query` is `role` itself or one of its ancestors.
    pub fn inherits(&self, role: Role, query: Role) -> Result<bool, ConfigError> {
        if role == query {
            return Ok(true);
        }
        Ok(self.ancestors(role)?.contains(&query))
    }

    /// Check every role's ancestry for cycles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in Role::ALL {
            self.ancestors(role)?;
        }
        Ok(())
    }
}

impl Default for RoleHierarchy {
    fn default() -> Self {
        Self::standard()
    }
}
