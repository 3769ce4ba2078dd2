//! Role/permission table configuration errors.
//!
//! These are fatal: every authorization decision depends on the tables, so a
//! host must refuse to start when construction fails.

use thiserror::Error;

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("role hierarchy contains a cycle through '{0}'")]
    HierarchyCycle(Role),

    #[error("role '{role}' declares more than one parent ('{first}', '{second}')")]
    MultipleParents { role: Role, first: Role, second: Role },

    #[error("ancestry of role '{0}' exceeds the number of known roles")]
    DepthExceeded(Role),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("permission table has no entry for role '{0}'")]
    MissingRole(Role),

    #[error("malformed permission '{0}' (expected 'resource:action')")]
    MalformedPermission(String),
}
