//! Error types for the reservation MAC.

use thiserror::Error;

/// Synchronous refusal of a reservation request at admission time.
///
/// A refused request is never enqueued and mutates no arbiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefuseReason {
    /// The request carried a fixed future start time, which this MAC does
    /// not support.
    #[error("unsupported start time")]
    UnsupportedStartTime,

    /// The requested duration was not in `(0, max_reservation_duration]`.
    #[error("bad duration")]
    BadDuration,

    /// The request's id is already queued or held by the active
    /// reservation.
    #[error("duplicate reservation id")]
    DuplicateId,
}

/// Errors surfaced by the [`CsmaMac`](crate::mac::CsmaMac) handle.
#[derive(Debug, Error)]
pub enum MacError {
    /// The request was refused at admission.
    #[error("reservation refused: {0}")]
    Refused(#[from] RefuseReason),

    /// The arbiter task is no longer running; the handle is unusable.
    #[error("MAC arbiter task has stopped")]
    Stopped,
}
