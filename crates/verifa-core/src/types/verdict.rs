//! Final per-document verdict.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Tri-state verdict outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Approved,
    NeedReview,
    Rejected,
}

/// Verdict derived from one document validation result.
///
/// Fields are private so a verdict cannot be altered after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    status: VerdictStatus,
    reasons: Vec<String>,
    score: f32,
}

impl Verdict {
    pub(crate) fn new(status: VerdictStatus, reasons: Vec<String>, score: f32) -> Self {
        Self {
            status,
            reasons,
            score,
        }
    }

    pub fn status(&self) -> VerdictStatus {
        self.status
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}
