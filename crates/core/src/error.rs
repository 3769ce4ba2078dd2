//! Core error model.

use thiserror::Error;

/// Result type used by core building blocks.
pub type CoreResult<T> = Result<T, CoreError>;

/// Validation failures for shared value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was empty or otherwise malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A value failed validation (e.g. a negative limit other than `-1`).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
