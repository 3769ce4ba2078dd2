//! `dashsphere-auth`: pure authorization core.
//!
//! Role hierarchy, permission tables and the decision engine. This crate is
//! intentionally decoupled from sessions, storage and transport: every
//! decision is a synchronous function of a principal snapshot and the tables.

pub mod authorize;
pub mod error;
pub mod permissions;
pub mod principal;
pub mod registry;
pub mod roles;

pub use authorize::{
    AuthorizationEngine, AuthorizationExplanation, AuthzError, DenialKind, GrantSource,
};
pub use error::ConfigError;
pub use permissions::{Permission, RolePermissionTable, catalog};
pub use principal::{Principal, ProfileUpdate};
pub use registry::RbacRegistry;
pub use roles::{Role, RoleHierarchy};
