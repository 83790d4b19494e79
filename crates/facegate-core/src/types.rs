use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence value reported by the recognition endpoint.
///
/// The endpoint is free to send either a number or a preformatted
/// string ("92.4%"); it is informational and rendered as-is, so no
/// numeric contract is enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Number(f64),
    Text(String),
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Number(n) => write!(f, "{n}"),
            Confidence::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Structured result of one remote recognition attempt.
///
/// Terminal for that attempt: `success` drives either the navigation
/// path or the retry path, and the payload it was produced from is
/// discarded either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub confidence: Option<Confidence>,
}

/// Category for a user-facing status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Error,
    Warning,
}

/// Rendering seam for human-readable status.
///
/// The session writes every user-visible state change through this
/// trait, so the detection and recovery logic stays independent of any
/// particular display surface.
pub trait Presenter {
    fn show(&self, message: &str, kind: MessageKind);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_numeric_confidence() {
        let json = r#"{"success": true, "message": "Welcome back", "confidence": 0.92}"#;
        let outcome: RecognitionOutcome = serde_json::from_str(json).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Welcome back");
        match outcome.confidence {
            Some(Confidence::Number(n)) => assert!((n - 0.92).abs() < 1e-9),
            other => panic!("expected numeric confidence, got {other:?}"),
        }
    }

    #[test]
    fn test_outcome_string_confidence() {
        let json = r#"{"success": true, "message": "ok", "confidence": "92.4%"}"#;
        let outcome: RecognitionOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.confidence.unwrap().to_string(), "92.4%");
    }

    #[test]
    fn test_outcome_failure_without_confidence() {
        let json = r#"{"success": false, "message": "not recognized"}"#;
        let outcome: RecognitionOutcome = serde_json::from_str(json).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "not recognized");
        assert!(outcome.confidence.is_none());
    }
}
