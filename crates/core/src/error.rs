//! Domain error model.

use thiserror::Error;

/// Result type used by parsing/validation helpers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic validation failures (malformed input).
///
/// Infrastructure failures (network, storage) have their own error types in
/// the crates that own those boundaries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
