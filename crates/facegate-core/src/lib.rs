//! facegate-core — Presence analysis and the auto-capture state machine.
//!
//! Pure logic, no I/O: the brightness-based region analyzer, the dwell
//! tracker that decides when a capture fires, and the outcome/presenter
//! types shared with the orchestrating session.

pub mod analyzer;
pub mod detection;
pub mod types;

pub use analyzer::{PresenceSignal, RegionAnalyzer};
pub use detection::{DetectionTracker, Phase};
pub use types::{Confidence, MessageKind, Presenter, RecognitionOutcome};
