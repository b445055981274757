//! Local channel occupancy estimate.
//!
//! The tracker folds observed transmit/receive activity into a single
//! `busy_until` horizon: any frame start pushes the horizon past the
//! frame's (hinted or assumed) duration plus the guard margin, and a frame
//! end leaves only the guard margin. When the horizon has passed, the
//! external probe gets the final word, failing open to "idle" so a missing
//! transceiver never stalls arbitration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::MacConfig;
use crate::phy::ChannelProbe;

/// One observation from the transceiver's activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelActivity {
    /// A frame started arriving. The hint, when present, is the expected
    /// reception time.
    RxStart { duration: Option<Duration> },
    /// A frame finished arriving.
    RxEnd,
    /// This node started transmitting. The hint, when present, is the
    /// expected transmission time.
    TxStart { duration: Option<Duration> },
}

/// Tracks how long the channel should be considered occupied based on
/// observed local activity.
#[derive(Debug)]
pub struct ChannelStateTracker {
    busy_until: Instant,
    guard_time: Duration,
    max_frame_duration: Duration,
}

impl ChannelStateTracker {
    /// Create a tracker that currently sees the channel as idle.
    pub fn new(config: &MacConfig) -> Self {
        Self {
            busy_until: Instant::now(),
            guard_time: config.guard_time(),
            max_frame_duration: config.max_frame_duration(),
        }
    }

    /// Fold one activity observation into the busy horizon.
    ///
    /// Frame starts without a duration hint assume the maximum frame
    /// duration; a frame end keeps only the guard margin.
    pub fn observe(&mut self, activity: ChannelActivity) {
        let now = Instant::now();
        self.busy_until = match activity {
            ChannelActivity::RxStart { duration } | ChannelActivity::TxStart { duration } => {
                now + duration.unwrap_or(self.max_frame_duration) + self.guard_time
            }
            ChannelActivity::RxEnd => now + self.guard_time,
        };
    }

    /// Whether the channel should be treated as busy right now.
    ///
    /// The local estimate wins while the horizon is in the future;
    /// afterwards the probe decides, with an absent or unanswering probe
    /// read as idle.
    pub fn is_busy(&self, probe: Option<&dyn ChannelProbe>) -> bool {
        if Instant::now() < self.busy_until {
            return true;
        }
        match probe {
            None => false,
            Some(p) => p.is_busy().unwrap_or(false),
        }
    }

    /// The current busy horizon.
    pub fn busy_until(&self) -> Instant {
        self.busy_until
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
