//! `dashsphere-console`: wires the session and tenant context together and
//! exposes the route guard and the authorized request pipeline.

pub mod config;
pub mod context;
pub mod guard;
pub mod transport;

pub use config::ConsoleConfig;
pub use context::{ConsoleContext, TenantMismatch};
pub use guard::{Navigation, Route, RouteGuard, standard_routes};
pub use transport::{
    ApiRequest, ApiResponse, AuthorizedClient, RequestError, TENANT_HEADER, Transport,
};
