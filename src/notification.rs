//! Reservation status notifications.
//!
//! Every terminal or transitional event in a reservation's life produces
//! exactly one [`ReservationStatusNtf`] on the outbound stream handed to
//! the caller at [`CsmaMac::spawn`](crate::mac::CsmaMac::spawn): `Start`
//! when granted, then eventually `End` (ran to completion) or `Cancel`
//! (cancelled while active). A request that never reaches a grant ends
//! with `Cancel` (cancelled while queued) or `Failure` (ttl expired).

use serde::{Deserialize, Serialize};

/// Lifecycle marker attached to a notification about a specific request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// The reservation was granted and the channel is now held.
    Start,
    /// The reservation ran its full duration.
    End,
    /// The request was dropped before a grant (ttl expired).
    Failure,
    /// The request was cancelled, either while queued or while active.
    Cancel,
}

/// Outbound notification about one reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStatusNtf {
    /// Id of the request this notification concerns.
    pub request_id: String,
    /// The lifecycle event.
    pub status: ReservationStatus,
}

impl ReservationStatusNtf {
    /// Build a notification for the given request id and status.
    pub fn new(request_id: impl Into<String>, status: ReservationStatus) -> Self {
        Self {
            request_id: request_id.into(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming_snake() {
        let ntf = ReservationStatusNtf::new("r1", ReservationStatus::Failure);
        let json = serde_json::to_value(&ntf).unwrap();
        assert_eq!(json["status"], "FAILURE");
        assert_eq!(json["request_id"], "r1");
    }
}
