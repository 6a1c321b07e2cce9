use crate::error::ShapeViolation;
use crate::models::evidence::Source;
use crate::models::validate::{check_unit_range, Validate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Clearly confirmed by the evidence.
    True,
    /// Clearly refuted by the evidence.
    False,
    /// Partly correct, with qualifications.
    PartiallyTrue,
    /// Technically correct but presented in a misleading context.
    Misleading,
    /// Not enough reliable sources to decide.
    Unverifiable,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::PartiallyTrue => "partially_true",
            Verdict::Misleading => "misleading",
            Verdict::Unverifiable => "unverifiable",
        }
    }

    pub fn parse(raw: &str) -> Option<Verdict> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "true" => Some(Verdict::True),
            "false" => Some(Verdict::False),
            "partially_true" => Some(Verdict::PartiallyTrue),
            "misleading" => Some(Verdict::Misleading),
            "unverifiable" => Some(Verdict::Unverifiable),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Judgement of one sub-claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubClaimVerdict {
    /// The sub-claim that was checked, verbatim.
    pub claim: String,
    /// The verdict for this sub-claim.
    pub verdict: Verdict,
    /// Confidence in the verdict, 0.0-1.0.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f32,
    /// Sources used for the verdict, most important first.
    pub evidence: Vec<Source>,
    /// Short justification of the verdict (2-3 sentences).
    pub reasoning: String,
}

impl SubClaimVerdict {
    pub fn unverifiable(claim: &str, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            claim: claim.to_string(),
            verdict: Verdict::Unverifiable,
            confidence,
            evidence: Vec::new(),
            reasoning: reasoning.into(),
        }
    }
}

impl Validate for SubClaimVerdict {
    fn validate(&self) -> Result<(), ShapeViolation> {
        check_unit_range("confidence", self.confidence)?;
        for (i, source) in self.evidence.iter().enumerate() {
            source.validate().map_err(|e| e.nested(&format!("evidence[{i}]")))?;
        }
        Ok(())
    }
}
