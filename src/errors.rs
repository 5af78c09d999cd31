//! Fixed rejection taxonomy for `submit`.

use thiserror::Error;

/// The exact wire strings a rejected `submit` can carry. Kept as a typed
/// enum (rather than ad hoc `&'static str`s scattered through the validator)
/// so the Rust type and the wire string can never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Task does not exist")]
    TaskDoesNotExist,
    #[error("Task expired")]
    TaskExpired,
    #[error("Submission too frequent")]
    TooFrequent,
    #[error("Duplicate submission")]
    Duplicate,
    #[error("Invalid result")]
    InvalidResult,
}

impl RejectReason {
    /// The exact string placed in the response envelope's `error` field.
    pub fn wire_str(&self) -> &'static str {
        match self {
            RejectReason::TaskDoesNotExist => "Task does not exist",
            RejectReason::TaskExpired => "Task expired",
            RejectReason::TooFrequent => "Submission too frequent",
            RejectReason::Duplicate => "Duplicate submission",
            RejectReason::InvalidResult => "Invalid result",
        }
    }
}
