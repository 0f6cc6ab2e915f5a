//! Error taxonomy for the engine.
//!
//! The first five variants are caller-recoverable and are surfaced verbatim to the transport layer.
//! [`CoreError::Internal`] covers lower-layer failures; any transaction that produces it is
//! discarded, so the vehicle/patient/trip triad is never left half-written.

use medtrip_ids::IdError;
use medtrip_types::{ParseEnumError, TextError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The entity exists but its current state forbids the requested transition.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation would violate an invariant (double onboarding, re-offboarding, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The principal is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected failure below the engine (store unavailable, snapshot I/O, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable tag for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "not_found",
            CoreError::InvalidState(_) => "invalid_state",
            CoreError::Conflict(_) => "conflict",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Internal(_) => "internal",
        }
    }

    /// True for every variant except [`CoreError::Internal`].
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::Internal(_))
    }
}

impl From<TextError> for CoreError {
    fn from(err: TextError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

impl From<IdError> for CoreError {
    fn from(err: IdError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

impl From<ParseEnumError> for CoreError {
    fn from(err: ParseEnumError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
