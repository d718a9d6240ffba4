//! Beat events, RR intervals and heart rate
//!
//! The detector flag stays raised for several consecutive samples of one QRS
//! complex. [`BeatGate`] reduces each run to a single beat, [`RrTracker`]
//! turns beats into plausibility-checked RR intervals and [`HeartRate`]
//! averages the accepted ones.

use crate::detector::DetectorConfig;
use biopulse_core::{Duration, Timestamp};
use serde::{Deserialize, Serialize};

/// Rising-edge beat gate with a refractory period
#[derive(Debug, Clone)]
pub struct BeatGate {
    refractory: Duration,
    previous_raw: bool,
    last_beat: Option<Timestamp>,
}

impl BeatGate {
    pub fn new(refractory_ms: f32) -> Self {
        Self {
            refractory: Duration::from_millis_f32(refractory_ms),
            previous_raw: false,
            last_beat: None,
        }
    }

    /// Returns `true` when `raw` starts a new beat at `now`
    pub fn update(&mut self, raw: bool, now: Timestamp) -> bool {
        let rising = raw && !self.previous_raw;
        self.previous_raw = raw;

        if !rising {
            return false;
        }

        let clear = match self.last_beat {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .map_or(true, |since| since >= self.refractory),
        };
        if clear {
            self.last_beat = Some(now);
        }
        clear
    }

    pub fn last_beat(&self) -> Option<Timestamp> {
        self.last_beat
    }

    pub fn reset(&mut self) {
        self.previous_raw = false;
        self.last_beat = None;
    }
}

/// Outcome of one beat for RR interval tracking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RrEvent {
    /// No earlier beat to measure from
    First,
    /// Interval inside the plausible range (ms)
    Accepted(f32),
    /// Interval outside the plausible range (ms); discarded
    Rejected(f32),
}

impl RrEvent {
    pub fn accepted(&self) -> Option<f32> {
        match self {
            RrEvent::Accepted(rr) => Some(*rr),
            _ => None,
        }
    }
}

/// Beat-to-beat interval tracker with plausibility bounds
#[derive(Debug, Clone)]
pub struct RrTracker {
    min_ms: f32,
    max_ms: f32,
    last_beat: Option<Timestamp>,
    accepted: u64,
    rejected: u64,
}

impl RrTracker {
    /// Tracker accepting intervals in `[min_ms, max_ms]`
    pub fn new(min_ms: f32, max_ms: f32) -> Self {
        Self {
            min_ms,
            max_ms,
            last_beat: None,
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.rr_min_ms, config.rr_max_ms)
    }

    /// Register a beat at `now`
    ///
    /// The reference time always moves to `now`, whether or not the interval
    /// is accepted.
    pub fn on_beat(&mut self, now: Timestamp) -> RrEvent {
        let previous = self.last_beat.replace(now);

        let Some(previous) = previous else {
            return RrEvent::First;
        };

        let rr_ms = match now.checked_duration_since(previous) {
            Some(interval) => interval.as_millis_f32(),
            // Clock stepped backwards
            None => {
                self.rejected += 1;
                return RrEvent::Rejected(0.0);
            }
        };

        if (self.min_ms..=self.max_ms).contains(&rr_ms) {
            self.accepted += 1;
            RrEvent::Accepted(rr_ms)
        } else {
            self.rejected += 1;
            RrEvent::Rejected(rr_ms)
        }
    }

    pub fn last_beat(&self) -> Option<Timestamp> {
        self.last_beat
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn reset(&mut self) {
        self.last_beat = None;
        self.accepted = 0;
        self.rejected = 0;
    }
}

/// Heart rate from accepted RR intervals
///
/// Keeps the last `window` intervals in a fixed ring; the mean rate is
/// `60000 / mean(RR)`.
#[derive(Debug, Clone)]
pub struct HeartRate {
    intervals: Vec<f32>,
    next: usize,
    filled: usize,
    latest_ms: Option<f32>,
}

impl HeartRate {
    pub fn new(window: usize) -> Self {
        Self {
            intervals: vec![0.0; window.max(1)],
            next: 0,
            filled: 0,
            latest_ms: None,
        }
    }

    /// Add an accepted interval and return the instantaneous rate in BPM
    pub fn push(&mut self, rr_ms: f32) -> f32 {
        self.intervals[self.next] = rr_ms;
        self.next = (self.next + 1) % self.intervals.len();
        self.filled = (self.filled + 1).min(self.intervals.len());
        self.latest_ms = Some(rr_ms);
        bpm_from_rr(rr_ms)
    }

    /// Rate implied by the most recent interval
    pub fn instantaneous_bpm(&self) -> Option<f32> {
        self.latest_ms.map(bpm_from_rr)
    }

    /// Rate implied by the mean of the stored intervals
    pub fn mean_bpm(&self) -> Option<f32> {
        if self.filled == 0 {
            return None;
        }
        let mean_rr = self.intervals[..self.filled].iter().sum::<f32>() / self.filled as f32;
        Some(bpm_from_rr(mean_rr))
    }

    pub fn window(&self) -> usize {
        self.intervals.len()
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn reset(&mut self) {
        self.intervals.fill(0.0);
        self.next = 0;
        self.filled = 0;
        self.latest_ms = None;
    }
}

#[inline]
fn bpm_from_rr(rr_ms: f32) -> f32 {
    60_000.0 / rr_ms
}
