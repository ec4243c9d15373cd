//! Score thresholding and confidence formatting

use serde::Serialize;

use crate::constants::{DETECTION_THRESHOLD, STATUS_DETECTED, STATUS_NOT_DETECTED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Positive only when the score is strictly above the threshold
    pub fn from_score(score: f32) -> Self {
        if score > DETECTION_THRESHOLD {
            Label::Positive
        } else {
            Label::Negative
        }
    }

    /// Localized status string sent to clients
    pub fn as_status(&self) -> &'static str {
        match self {
            Label::Positive => STATUS_DETECTED,
            Label::Negative => STATUS_NOT_DETECTED,
        }
    }
}

/// Outcome of classifying one piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub label: Label,
    pub confidence: String,
    pub raw: f32,
}

impl Verdict {
    pub fn from_score(score: f32) -> Self {
        Self {
            label: Label::from_score(score),
            confidence: format_confidence(score),
            raw: score,
        }
    }

    /// Reported when a video scan finishes without crossing the threshold.
    /// Sub-threshold scores seen along the way are not carried over.
    pub fn undetected() -> Self {
        Self::from_score(0.0)
    }

    pub fn is_positive(&self) -> bool {
        self.label == Label::Positive
    }
}

/// e.g. 0.8312 -> "83.12%"
pub fn format_confidence(score: f32) -> String {
    format!("{:.2}%", score * 100.0)
}
