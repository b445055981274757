//! MAC configuration surface.
//!
//! Carries the tunables a caller may adjust (backoff window bounds and
//! reservation duration limits) together with the fixed channel timing
//! margins. All durations that cross the API boundary are plain seconds,
//! matching the reservation protocol; the accessors convert to
//! [`Duration`] for internal arithmetic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the CSMA reservation arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacConfig {
    /// Lower clamp for the randomized backoff window, in seconds.
    #[serde(default = "default_min_backoff")]
    pub min_backoff: f32,

    /// Upper clamp for the randomized backoff window, in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff: f32,

    /// Longest admissible reservation, in seconds. Checked at admission.
    #[serde(default = "default_max_reservation_duration")]
    pub max_reservation_duration: f32,

    /// Advisory duration for callers picking a sensible reservation length.
    /// Not enforced anywhere.
    #[serde(default = "default_recommended_reservation_duration")]
    pub recommended_reservation_duration: f32,

    /// Dead-time margin added after any observed channel activity, in
    /// milliseconds. Absorbs frame-boundary timing uncertainty.
    #[serde(default = "default_guard_time_ms")]
    pub guard_time_ms: u64,

    /// Conservative substitute for a frame whose duration is unknown, in
    /// milliseconds.
    #[serde(default = "default_max_frame_duration_ms")]
    pub max_frame_duration_ms: u64,
}

fn default_min_backoff() -> f32 {
    0.5
}

fn default_max_backoff() -> f32 {
    30.0
}

fn default_max_reservation_duration() -> f32 {
    60.0
}

fn default_recommended_reservation_duration() -> f32 {
    15.0
}

fn default_guard_time_ms() -> u64 {
    500
}

fn default_max_frame_duration_ms() -> u64 {
    1500
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            min_backoff: default_min_backoff(),
            max_backoff: default_max_backoff(),
            max_reservation_duration: default_max_reservation_duration(),
            recommended_reservation_duration: default_recommended_reservation_duration(),
            guard_time_ms: default_guard_time_ms(),
            max_frame_duration_ms: default_max_frame_duration_ms(),
        }
    }
}

impl MacConfig {
    /// Guard margin as a [`Duration`].
    pub fn guard_time(&self) -> Duration {
        Duration::from_millis(self.guard_time_ms)
    }

    /// Default frame duration as a [`Duration`].
    pub fn max_frame_duration(&self) -> Duration {
        Duration::from_millis(self.max_frame_duration_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
