//! Authentication failures surfaced by login/refresh/restore.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("refresh token is invalid or expired")]
    InvalidRefreshToken,

    #[error("access token is invalid or expired")]
    InvalidAccessToken,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A logout or another login overtook this request while it was in flight.
    #[error("session changed while the request was in flight")]
    SessionChanged,
}

impl AuthError {
    /// Whether the failure says the stored credentials are no longer usable
    /// (as opposed to a transient transport/backend problem).
    pub fn invalidates_credentials(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::InvalidRefreshToken
                | AuthError::InvalidAccessToken
        )
    }
}
