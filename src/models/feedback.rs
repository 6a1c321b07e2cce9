use crate::models::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// A reviewer's answer for one sub-claim. `corrected_verdict: None` accepts the automated verdict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubClaimFeedback {
    pub claim: String,
    #[serde(default)]
    pub corrected_verdict: Option<Verdict>,
    #[serde(default)]
    pub user_comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanFeedback {
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub sub_claim_feedback: Vec<SubClaimFeedback>,
    #[serde(default)]
    pub general_comment: Option<String>,
}

impl HumanFeedback {
    pub fn correction_count(&self) -> usize {
        self.sub_claim_feedback
            .iter()
            .filter(|f| f.corrected_verdict.is_some())
            .count()
    }
}
