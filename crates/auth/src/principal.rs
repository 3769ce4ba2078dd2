use serde::{Deserialize, Serialize};

use dashsphere_core::{TenantId, UserId};

use crate::{Permission, Role};

/// The authenticated user, as seen by authorization decisions.
///
/// `permissions` holds ad-hoc grants layered on top of the role's table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

impl Principal {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            avatar: None,
            role,
            permissions: Vec::new(),
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// True iff the principal is affiliated with `tenant_id`.
    pub fn is_own_tenant(&self, tenant_id: &TenantId) -> bool {
        self.tenant_id.as_ref() == Some(tenant_id)
    }

    /// Shallow-merge a partial update: every `Some` field replaces the current value.
    pub fn apply(&mut self, update: ProfileUpdate) {
        let ProfileUpdate {
            name,
            email,
            avatar,
            role,
            permissions,
            tenant_id,
        } = update;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(avatar) = avatar {
            self.avatar = avatar;
        }
        if let Some(role) = role {
            self.role = role;
        }
        if let Some(permissions) = permissions {
            self.permissions = permissions;
        }
        if let Some(tenant_id) = tenant_id {
            self.tenant_id = tenant_id;
        }
    }
}

/// Partial principal update.
///
/// Nullable fields use a nested `Option`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenant_id: Option<Option<TenantId>>,
}

/// A present field, `null` included, becomes `Some`; `default` covers absence.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
