//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failure raised by aggregates and value constructors.
///
/// Storage and transport failures have their own error types in the
/// infrastructure layer. Running out of stock is not an error either: the
/// product records an `OutOfStock` event and the command still commits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input the model refuses (zero quantity, line sent to the wrong product).
    #[error("validation failed: {0}")]
    Validation(String),

    /// State the model should never reach.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Blank or malformed SKU / batch reference / order id.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The change clashes with existing state (e.g. a batch reference already in use).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
