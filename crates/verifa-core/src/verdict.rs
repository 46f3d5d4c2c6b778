//! Verdict aggregation.

use crate::types::{DocumentValidationResult, Verdict, VerdictStatus};

/// Score attached to a verdict that needs human review.
pub const REVIEW_SCORE: f32 = 0.7;

/// Reduce a validation result to a verdict.
///
/// Any error rejects, regardless of how many checks passed. Otherwise any
/// warning asks for review. Otherwise the document is approved.
pub fn aggregate(result: &DocumentValidationResult) -> Verdict {
    if !result.errors.is_empty() {
        Verdict::new(VerdictStatus::Rejected, result.errors.clone(), 0.0)
    } else if !result.warnings.is_empty() {
        Verdict::new(VerdictStatus::NeedReview, result.warnings.clone(), REVIEW_SCORE)
    } else {
        Verdict::new(
            VerdictStatus::Approved,
            vec!["all checks passed".to_string()],
            1.0,
        )
    }
}
