//! Shared primitives for all Rust crates in Warden.

#![forbid(unsafe_code)]

/// Named access-governance errors.
pub mod governance;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use governance::GovernanceError;

/// Result type used across Warden crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A grant, appeal, approval, approver or policy is absent.
    NotFound,
    /// A required input is empty or malformed.
    InvalidInput,
    /// The requested transition is not allowed from the current state.
    InvalidStateTransition,
    /// The actor is not allowed to perform the action.
    Forbidden,
    /// An external provider call failed.
    UpstreamFailure,
    /// A repository call failed or left state inconsistent.
    PersistenceFailure,
    /// Policy or runtime configuration cannot be evaluated.
    Configuration,
    /// Internal unexpected error.
    Internal,
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor is blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// External provider call failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Repository call failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Policy or runtime configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation failed and its compensating write failed too.
    ///
    /// Persisted state may no longer match the external system.
    #[error("{operation}; rollback failed: {rollback}")]
    RollbackFailed {
        /// Error of the primary operation.
        operation: String,
        /// Error of the compensating write.
        rollback: String,
    },

    /// Named governance error.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::InvalidStateTransition,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Upstream(_) => ErrorKind::UpstreamFailure,
            Self::Persistence(_) | Self::RollbackFailed { .. } => ErrorKind::PersistenceFailure,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Governance(error) => error.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the named governance error, if any.
    #[must_use]
    pub fn governance(&self) -> Option<GovernanceError> {
        match self {
            Self::Governance(error) => Some(*error),
            _ => None,
        }
    }
}
