use crate::models::{HumanFeedback, SubClaimVerdict};
use tracing::{debug, info};

pub const NO_REVIEW_NOTE: &str = "no human review";

#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    pub sub_verdicts: Vec<SubClaimVerdict>,
    /// Line handed to the synthesizer describing the review.
    pub review_note: String,
    /// Number of sub-verdicts whose verdict was overwritten.
    pub applied: usize,
}

/// Applies reviewer corrections to the evaluated sub-verdicts.
///
/// Corrections are matched by exact claim text; unmatched ones are dropped.
/// The automated verdict survives only inside the appended provenance note.
pub fn merge_feedback(
    mut sub_verdicts: Vec<SubClaimVerdict>,
    feedback: Option<&HumanFeedback>,
) -> MergeOutcome {
    let Some(feedback) = feedback.filter(|f| f.reviewed) else {
        return MergeOutcome {
            sub_verdicts,
            review_note: NO_REVIEW_NOTE.to_string(),
            applied: 0,
        };
    };

    let mut applied = 0;
    for correction in &feedback.sub_claim_feedback {
        let Some(corrected) = correction.corrected_verdict else {
            continue;
        };
        let Some(target) = sub_verdicts.iter_mut().find(|v| v.claim == correction.claim) else {
            debug!(claim = %correction.claim, "correction names no known sub-claim, ignored");
            continue;
        };
        info!(
            claim = %target.claim,
            from = %target.verdict,
            to = %corrected,
            "applying reviewer correction"
        );
        target.verdict = corrected;
        if let Some(comment) = correction.user_comment.as_deref().filter(|c| !c.trim().is_empty()) {
            target.reasoning.push_str(&format!(" [user correction: {comment}]"));
        }
        applied += 1;
    }

    MergeOutcome {
        sub_verdicts,
        review_note: review_note(feedback, applied),
        applied,
    }
}

fn review_note(feedback: &HumanFeedback, applied: usize) -> String {
    let mut note = if applied == 0 {
        "reviewed by a human, all automated verdicts confirmed".to_string()
    } else {
        format!("reviewed by a human, {applied} verdict(s) corrected")
    };
    if let Some(comment) = feedback.general_comment.as_deref().filter(|c| !c.trim().is_empty()) {
        note.push_str(&format!("; reviewer comment: {comment}"));
    }
    note
}
