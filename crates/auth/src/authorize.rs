use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use dashsphere_core::{TenantId, UserId};

use crate::{ConfigError, Permission, Principal, Role, RoleHierarchy, RolePermissionTable, catalog};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Role-hierarchy and permission-membership decisions.
///
/// - No IO
/// - No panics
/// - No mutable state: a pure function of (principal, tables)
///
/// Permission lookups are table-driven per role. The hierarchy only answers
/// role queries; it never unions an ancestor's table entry into a descendant.
/// `super_admin` bypasses the table entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationEngine {
    hierarchy: RoleHierarchy,
    table: RolePermissionTable,
}

impl AuthorizationEngine {
    pub fn new(hierarchy: RoleHierarchy, table: RolePermissionTable) -> Result<Self, ConfigError> {
        hierarchy.validate()?;
        Ok(Self { hierarchy, table })
    }

    /// Engine over the console's built-in hierarchy and permission table.
    pub fn standard() -> Self {
        Self {
            hierarchy: RoleHierarchy::standard(),
            table: RolePermissionTable::standard(),
        }
    }

    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    pub fn table(&self) -> &RolePermissionTable {
        &self.table
    }

    /// True iff `query` equals `role` or is one of its ancestors.
    ///
    /// A walk past the depth bound or around a cycle is a configuration
    /// error, reported as `Err` rather than folded into `false`.
    pub fn try_role_matches(&self, role: Role, query: Role) -> Result<bool, ConfigError> {
        self.hierarchy.inherits(role, query)
    }

    /// Infallible form of [`try_role_matches`](Self::try_role_matches).
    ///
    /// Every constructor validates the hierarchy, so the walk cannot fail
    /// here. Should it ever, the error is logged and the query denied.
    pub fn role_matches(&self, role: Role, query: Role) -> bool {
        self.try_role_matches(role, query).unwrap_or_else(|err| {
            tracing::error!(%role, %query, error = %err, "role hierarchy walk failed");
            false
        })
    }

    /// `role_matches` against an optional principal; no principal never matches.
    pub fn has_role(&self, principal: Option<&Principal>, query: Role) -> bool {
        principal.is_some_and(|p| self.role_matches(p.role, query))
    }

    pub fn has_permission(&self, principal: Option<&Principal>, permission: &Permission) -> bool {
        self.grant_source(principal, permission).is_some()
    }

    /// At least one of `permissions` is granted. False for an empty set.
    pub fn has_any<'a>(
        &self,
        principal: Option<&Principal>,
        permissions: impl IntoIterator<Item = &'a Permission>,
    ) -> bool {
        permissions
            .into_iter()
            .any(|p| self.has_permission(principal, p))
    }

    /// Every one of `permissions` is granted. Vacuously true for an empty set.
    pub fn has_all<'a>(
        &self,
        principal: Option<&Principal>,
        permissions: impl IntoIterator<Item = &'a Permission>,
    ) -> bool {
        permissions
            .into_iter()
            .all(|p| self.has_permission(principal, p))
    }

    /// Command-boundary form of [`has_permission`](Self::has_permission).
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        permission: &Permission,
    ) -> Result<(), AuthzError> {
        match principal {
            None => Err(AuthzError::Unauthenticated),
            Some(_) if self.has_permission(principal, permission) => Ok(()),
            Some(_) => Err(AuthzError::Forbidden(permission.as_str().to_string())),
        }
    }

    /// Role-table grants plus ad-hoc grants, sorted.
    ///
    /// For `super_admin` this is the catalogue plus everything the table
    /// mentions, since the escape hatch grants any token.
    pub fn effective_permissions(&self, principal: &Principal) -> BTreeSet<Permission> {
        let mut effective = self.table.permissions_for(principal.role);
        effective.extend(principal.permissions.iter().cloned());
        if principal.role == Role::SuperAdmin {
            effective.extend(catalog::ALL.iter().cloned());
            effective.extend(self.table.all_permissions());
        }
        effective
    }

    fn grant_source(
        &self,
        principal: Option<&Principal>,
        permission: &Permission,
    ) -> Option<GrantSource> {
        let principal = principal?;
        if principal.role == Role::SuperAdmin {
            Some(GrantSource::SuperAdmin)
        } else if principal.permissions.contains(permission) {
            Some(GrantSource::AdHocGrant)
        } else if self.table.grants(principal.role, permission) {
            Some(GrantSource::RoleTable)
        } else {
            None
        }
    }

    /// Explain why a permission check would be granted or denied.
    ///
    /// Intended for audit trails and "why can't I see this page" diagnostics;
    /// the decision itself always matches [`has_permission`](Self::has_permission).
    pub fn explain(
        &self,
        principal: Option<&Principal>,
        permission: &Permission,
    ) -> AuthorizationExplanation {
        let required = permission.as_str().to_string();

        let Some(p) = principal else {
            return AuthorizationExplanation {
                required_permission: required,
                granted: false,
                source: None,
                reason: "No authenticated principal".to_string(),
                principal: None,
                denial_reason: Some(DenialReason {
                    kind: DenialKind::NoPrincipal,
                    message: "No session: every permission is denied".to_string(),
                    suggestions: vec!["Sign in before requesting this resource".to_string()],
                }),
            };
        };

        let state = PrincipalState {
            principal_id: p.id.clone(),
            tenant_id: p.tenant_id.clone(),
            role: p.role,
            ancestors: self.hierarchy.ancestors(p.role).unwrap_or_default(),
            ad_hoc_permissions: p.permissions.iter().map(|x| x.as_str().to_string()).collect(),
            effective_permissions: self
                .effective_permissions(p)
                .iter()
                .map(|x| x.as_str().to_string())
                .collect(),
        };

        match self.grant_source(principal, permission) {
            Some(source) => {
                let reason = match source {
                    GrantSource::SuperAdmin => {
                        format!("Role '{}' has unrestricted access", Role::SuperAdmin)
                    }
                    GrantSource::AdHocGrant => {
                        format!("Principal holds an ad-hoc grant for '{}'", required)
                    }
                    GrantSource::RoleTable => {
                        format!("Role '{}' lists '{}' in its permission table", p.role, required)
                    }
                };
                AuthorizationExplanation {
                    required_permission: required,
                    granted: true,
                    source: Some(source),
                    reason,
                    principal: Some(state),
                    denial_reason: None,
                }
            }
            None => {
                let granting_roles = self.table.roles_granting(permission);
                let mut suggestions = vec![format!(
                    "Grant the '{}' permission directly to the principal",
                    required
                )];
                if !granting_roles.is_empty() {
                    let names: Vec<&str> = granting_roles.iter().map(Role::as_str).collect();
                    suggestions.insert(
                        0,
                        format!("Assign one of the roles that list it: {}", names.join(", ")),
                    );
                }
                if state.ancestors.iter().any(|r| granting_roles.contains(r)) {
                    suggestions.push(
                        "An ancestor role lists it, but role tables are not inherited".to_string(),
                    );
                }

                AuthorizationExplanation {
                    reason: format!("Role '{}' does not grant '{}'", p.role, required),
                    required_permission: required.clone(),
                    granted: false,
                    source: None,
                    principal: Some(state),
                    denial_reason: Some(DenialReason {
                        kind: DenialKind::MissingPermission,
                        message: format!("Missing required permission: '{}'", required),
                        suggestions,
                    }),
                }
            }
        }
    }
}

impl Default for AuthorizationEngine {
    fn default() -> Self {
        Self::standard()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Which rule granted a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    SuperAdmin,
    AdHocGrant,
    RoleTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub source: Option<GrantSource>,
    pub reason: String,
    pub principal: Option<PrincipalState>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub principal_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub role: Role,
    pub ancestors: Vec<Role>,
    pub ad_hoc_permissions: Vec<String>,
    pub effective_permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NoPrincipal,
    MissingPermission,
}
