//! Identity session: login, restore, refresh and logout of the console user.

pub mod authenticator;
pub mod credentials;
pub mod error;
pub mod session;

pub use authenticator::{Authenticator, InMemoryAuthenticator, LoginGrant};
pub use credentials::{Credentials, TokenPair};
pub use error::AuthError;
pub use session::{IdentitySession, SessionEvent, SessionPhase, SessionSnapshot};
