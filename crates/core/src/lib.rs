//! `dashsphere-core`: shared building blocks for the console core.
//!
//! Identifiers, the key/value persistence seam and the in-process notifier.
//! Nothing in here knows about roles, sessions or tenants.

pub mod error;
pub mod id;
pub mod notify;
pub mod storage;

pub use error::{CoreError, CoreResult};
pub use id::{TenantId, UserId};
pub use notify::{Notifier, Subscription};
pub use storage::{InMemoryKeyValueStore, KeyValueStore, StorageKeys};
