use crate::error::ShapeViolation;
use crate::models::evidence::Source;
use crate::models::validate::{check_unit_range, Validate};
use crate::models::verdict::{SubClaimVerdict, Verdict};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_KEY_SOURCES: usize = 5;

/// Overall outcome of a fact check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FactCheckResult {
    /// The original claim, verbatim.
    pub original_claim: String,
    /// Overall verdict.
    pub overall_verdict: Verdict,
    /// Overall confidence, 0.0-1.0: the weighted average of the sub-verdict confidences.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f32,
    /// Verdicts of the individual sub-claims, in order.
    pub sub_verdicts: Vec<SubClaimVerdict>,
    /// Summary in 3-5 sentences, in the language of the original claim.
    pub summary: String,
    /// The 3-5 most important sources overall.
    #[schemars(length(max = 5))]
    pub key_sources: Vec<Source>,
}

/// What the synthesizer produces. Claim text and sub-verdicts come from the
/// workflow state, so anything the engine echoes for them is ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Synthesis {
    /// Overall verdict.
    pub overall_verdict: Verdict,
    /// Overall confidence, 0.0-1.0: the weighted average of the sub-verdict confidences.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f32,
    /// Summary in 3-5 sentences, in the language of the original claim.
    pub summary: String,
    /// The 3-5 most important sources overall.
    #[schemars(length(max = 5))]
    pub key_sources: Vec<Source>,
}

impl Synthesis {
    pub fn into_result(self, claim: &str, sub_verdicts: Vec<SubClaimVerdict>) -> FactCheckResult {
        FactCheckResult {
            original_claim: claim.to_string(),
            overall_verdict: self.overall_verdict,
            confidence: self.confidence,
            sub_verdicts,
            summary: self.summary,
            key_sources: self.key_sources,
        }
    }
}

impl Validate for Synthesis {
    fn validate(&self) -> Result<(), ShapeViolation> {
        check_unit_range("confidence", self.confidence)?;
        check_key_sources(&self.key_sources)
    }
}

impl Validate for FactCheckResult {
    fn validate(&self) -> Result<(), ShapeViolation> {
        check_unit_range("confidence", self.confidence)?;
        for (i, sub) in self.sub_verdicts.iter().enumerate() {
            sub.validate().map_err(|e| e.nested(&format!("sub_verdicts[{i}]")))?;
        }
        check_key_sources(&self.key_sources)
    }
}

fn check_key_sources(key_sources: &[Source]) -> Result<(), ShapeViolation> {
    if key_sources.len() > MAX_KEY_SOURCES {
        return Err(ShapeViolation::new(
            "key_sources",
            format!("at most {MAX_KEY_SOURCES} sources, got {}", key_sources.len()),
        ));
    }
    for (i, source) in key_sources.iter().enumerate() {
        source.validate().map_err(|e| e.nested(&format!("key_sources[{i}]")))?;
    }
    Ok(())
}
