//! Typed identifiers for the medtrip engine.
//!
//! Every entity the engine stores is keyed by a UUIDv4, but a bare `Uuid` makes it far too easy
//! to hand a vehicle id to a function that wants a patient id. This crate wraps each kind of key
//! in its own newtype so those mix-ups fail to compile.
//!
//! ## Canonical form
//! All identifiers render as **32 lowercase hexadecimal characters** (no hyphens), for example
//! `550e8400e29b41d4a716446655440000`. Parsing is strict: hyphenated or uppercase input is
//! rejected so the same entity never appears under two spellings in logs, URLs or the data file.

mod id;

pub use id::{
    AssignmentId, CollaborationRequestId, DataEntryId, OrganizationId, PartnershipId, PatientId,
    TripId, UserId, VehicleId,
};

/// Re-exported for callers that need the raw value.
pub use ::uuid::Uuid;

/// Error type for identifier parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// The input was not a canonical 32-hex identifier.
    #[error("invalid {kind} id: expected 32 lowercase hex characters, got '{input}'")]
    InvalidFormat { kind: &'static str, input: String },
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;

/// Returns true if `input` is in canonical identifier form.
///
/// Purely syntactic: exactly 32 bytes, each one of `0-9` or `a-f`.
pub fn is_canonical(input: &str) -> bool {
    input.len() == 32
        && input
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
