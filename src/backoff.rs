//! Randomized exponential backoff.
//!
//! Each grant attempt that finds the channel busy widens the window:
//! `raw = frame_duration * (2^consecutive_busy - 1)`, clamped to the
//! configured `[min_backoff, max_backoff]` bounds. The delay actually
//! waited is drawn uniformly from `[0, clamped]` and rounded to
//! millisecond resolution, so independent arbiters making the same
//! decision are unlikely to retry in lockstep. The one deterministic case
//! is a clamped window of exactly zero, which yields no wait at all.

use std::time::Duration;

use rand::Rng;

use crate::config::MacConfig;

/// Computes backoff delays and tracks the consecutive-busy count.
#[derive(Debug)]
pub struct BackoffScheduler {
    min_backoff: f64,
    max_backoff: f64,
    consecutive_busy: u32,
}

impl BackoffScheduler {
    /// Create a scheduler with the configured window bounds.
    pub fn new(config: &MacConfig) -> Self {
        Self {
            min_backoff: config.min_backoff as f64,
            max_backoff: config.max_backoff as f64,
            consecutive_busy: 0,
        }
    }

    /// Record that a grant attempt found the channel busy.
    pub fn note_busy(&mut self) {
        self.consecutive_busy += 1;
    }

    /// Reset the consecutive-busy count after a successful grant.
    pub fn reset(&mut self) {
        self.consecutive_busy = 0;
    }

    /// Current consecutive-busy count.
    pub fn consecutive_busy(&self) -> u32 {
        self.consecutive_busy
    }

    /// Compute the next backoff delay for the given frame duration.
    ///
    /// Returns exactly [`Duration::ZERO`] when the clamped window is zero
    /// (no contention observed and `min_backoff == 0`).
    pub fn next_delay(&self, frame_duration: Duration) -> Duration {
        let factor = ((1u64 << self.consecutive_busy.min(63)) - 1) as f64;
        let mut window = frame_duration.as_secs_f64() * factor;
        if window < self.min_backoff {
            window = self.min_backoff;
        } else if window > self.max_backoff {
            window = self.max_backoff;
        }
        if window == 0.0 {
            return Duration::ZERO;
        }
        let drawn: f64 = rand::thread_rng().gen_range(0.0..=window);
        Duration::from_millis((drawn * 1000.0).round() as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
