//! Set operation errors.

use thiserror::Error;

use crate::ipset::types::Family;

/// Errors returned by control-plane set operations.
///
/// The packet path never produces these; it degrades to `TestResult::NotFound`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetError {
    /// The request addresses a different family than the set was created with.
    #[error("family mismatch: set is {set}, request is {request}")]
    FamilyMismatch { set: Family, request: Family },

    /// `from > to`, prefix out of bounds, or host bits set past an explicit prefix.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// The set type or family cannot express the request.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Decomposition would emit more elements than the per-request cap.
    #[error("request expands to {requested} elements, limit is {limit}")]
    CapacityExceeded { requested: u64, limit: u64 },

    /// Strict add collided with an entry carrying a different nomatch flag.
    #[error("element {0} already exists with a different nomatch flag")]
    KeyCollision(String),

    /// None of the requested elements are present.
    #[error("element not found")]
    NotFound,

    /// Adding would exceed the set's element limit.
    #[error("set is full ({limit} elements)")]
    SetFull { limit: usize },

    /// No variant registered for this (type, family) pair.
    #[error("unknown set type {name} for family {family}")]
    UnknownType { name: String, family: Family },

    /// Entry text could not be parsed.
    #[error("invalid entry {entry:?}: {reason}")]
    InvalidEntry { entry: String, reason: String },
}

impl SetError {
    pub(crate) fn invalid_entry(entry: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FamilyMismatch { .. } => "family_mismatch",
            Self::InvalidRange(_) => "invalid_range",
            Self::UnsupportedOperation(_) => "unsupported",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::KeyCollision(_) => "key_collision",
            Self::NotFound => "not_found",
            Self::SetFull { .. } => "set_full",
            Self::UnknownType { .. } => "unknown_type",
            Self::InvalidEntry { .. } => "invalid_entry",
        }
    }
}
