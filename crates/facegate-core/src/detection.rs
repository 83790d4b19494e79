//! Dwell tracker — decides when a stable detection becomes a capture.
//!
//! Pure state machine: the session feeds it one presence reading per
//! tick together with the current instant, and it reports whether the
//! capture trigger fires. All timing comparisons live here so the
//! temporal contract is testable without a camera or a runtime.

use std::time::{Duration, Instant};

/// Default cadence of the detection loop.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Default continuous-presence duration required before capture.
pub const DEFAULT_DWELL_THRESHOLD: Duration = Duration::from_millis(1500);

/// Phase of the auto-capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Camera not ready; readings are ignored.
    Idle,
    /// Polling for presence; no dwell in progress.
    Watching,
    /// Presence has been continuously true since `first_detected_at`.
    Dwelling,
    /// Trigger fired; readings are ignored until `resume()`.
    Suspended,
}

/// Tracks how long presence has been continuously true and fires the
/// capture trigger exactly once per stable detection.
///
/// Invariant: `first_detected_at` is `Some` exactly while the phase is
/// `Dwelling`; every transition out of `Dwelling` discards it, so a
/// stale dwell can never cause an immediate re-trigger after resume.
pub struct DetectionTracker {
    dwell_threshold: Duration,
    phase: Phase,
    first_detected_at: Option<Instant>,
}

impl DetectionTracker {
    pub fn new(dwell_threshold: Duration) -> Self {
        Self {
            dwell_threshold,
            phase: Phase::Idle,
            first_detected_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Start of the current dwell, if one is in progress.
    pub fn first_detected_at(&self) -> Option<Instant> {
        self.first_detected_at
    }

    /// Camera ready: begin watching. No-op unless `Idle`.
    pub fn arm(&mut self) {
        if self.phase == Phase::Idle {
            self.phase = Phase::Watching;
        }
    }

    /// Feed one presence reading. Returns `true` when the capture
    /// trigger fires; the tracker then suspends itself and ignores
    /// further readings until `resume()`.
    pub fn observe(&mut self, present: bool, now: Instant) -> bool {
        match self.phase {
            Phase::Idle | Phase::Suspended => false,
            Phase::Watching | Phase::Dwelling if !present => {
                // Interruption resets the dwell clock; no partial credit.
                self.phase = Phase::Watching;
                self.first_detected_at = None;
                false
            }
            Phase::Watching => {
                self.phase = Phase::Dwelling;
                self.first_detected_at = Some(now);
                tracing::trace!("presence detected, dwell started");
                false
            }
            Phase::Dwelling => {
                let since = self
                    .first_detected_at
                    .map(|t| now.duration_since(t))
                    .unwrap_or_default();
                if since >= self.dwell_threshold {
                    tracing::debug!(dwell_ms = since.as_millis() as u64, "capture trigger");
                    self.phase = Phase::Suspended;
                    self.first_detected_at = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Resume watching after a completed (failed) capture flow.
    /// Clears all dwell state. No-op unless `Suspended`.
    pub fn resume(&mut self) {
        if self.phase == Phase::Suspended {
            self.phase = Phase::Watching;
            self.first_detected_at = None;
        }
    }
}

impl Default for DetectionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DWELL_THRESHOLD)
    }
}
