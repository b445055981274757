//! Reservation request types.
//!
//! [`ReservationRequest`] is the wire-facing request a node submits to the
//! arbiter. Once admitted it is wrapped in a [`QueuedRequest`] carrying the
//! ttl rebased onto the monotonic clock; nothing else about an admitted
//! request ever changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// A request for a time-bounded exclusive reservation of the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    /// Opaque unique identifier. Generated as a UUID v4 by
    /// [`ReservationRequest::new`]; callers supplying their own ids are
    /// responsible for uniqueness.
    pub id: String,

    /// Requested reservation length in seconds. Must be positive and no
    /// larger than the configured maximum.
    pub duration: f32,

    /// Optional time-to-live in seconds, relative to submission. A request
    /// still queued when its ttl elapses is dropped with a `Failure`
    /// notification instead of being granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<f32>,

    /// Optional fixed start time. Timed reservations are not supported;
    /// any request carrying this field is refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl ReservationRequest {
    /// Create a request for `duration` seconds with a fresh UUID v4 id.
    pub fn new(duration: f32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            duration,
            ttl: None,
            start_time: None,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set a time-to-live in seconds.
    pub fn with_ttl(mut self, ttl: f32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set a fixed start time. The arbiter refuses such requests; the
    /// field exists so the refusal can be exercised end to end.
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// An admitted request waiting in the pending queue.
///
/// The relative ttl has been rebased to an absolute monotonic deadline at
/// admission, so expiry checks are immune to wall-clock adjustment.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    /// The admitted request, immutable from here on.
    pub request: ReservationRequest,

    /// Absolute deadline derived from the ttl, if one was set.
    pub deadline: Option<Instant>,
}

impl QueuedRequest {
    /// Whether the ttl elapsed before this request could be granted.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d < now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
