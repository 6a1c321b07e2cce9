use crate::error::ShapeViolation;
use crate::models::validate::{check_len, check_non_empty, Validate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_SUB_CLAIMS: usize = 5;
pub const MAX_QUERIES_PER_SUB_CLAIM: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    /// A checkable statement of fact.
    Factual,
    /// An expression of opinion; decomposed anyway but flagged.
    Opinion,
    /// Contains both facts and opinions.
    Mixed,
    /// A statement about the future.
    Prediction,
}

/// The claim under check together with what the decomposer detected about it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub language: String,
    pub claim_type: ClaimType,
}

/// One independently checkable assertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubClaim {
    /// The sub-claim as one clear sentence.
    pub claim: String,
    /// 2-3 targeted, neutral search queries for checking this sub-claim.
    #[schemars(length(min = 1, max = 3))]
    pub search_queries: Vec<String>,
}

/// A claim split into checkable parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClaimDecomposition {
    /// The original claim, verbatim.
    pub original_claim: String,
    /// Kind of claim.
    pub claim_type: ClaimType,
    /// Detected language of the claim as an ISO code, e.g. "en", "de".
    #[serde(default = "default_language")]
    pub language: String,
    /// The checkable sub-claims.
    #[schemars(length(min = 1, max = 5))]
    pub sub_claims: Vec<SubClaim>,
}

fn default_language() -> String {
    "en".to_string()
}

impl ClaimDecomposition {
    pub fn claim(&self) -> Claim {
        Claim {
            text: self.original_claim.clone(),
            language: self.language.clone(),
            claim_type: self.claim_type,
        }
    }

    pub fn query_count(&self) -> usize {
        self.sub_claims.iter().map(|s| s.search_queries.len()).sum()
    }
}

impl Validate for ClaimDecomposition {
    fn validate(&self) -> Result<(), ShapeViolation> {
        check_non_empty("original_claim", &self.original_claim)?;
        check_len("sub_claims", &self.sub_claims, 1, MAX_SUB_CLAIMS)?;
        for (i, sub) in self.sub_claims.iter().enumerate() {
            check_non_empty(&format!("sub_claims[{i}].claim"), &sub.claim)?;
            check_len(
                &format!("sub_claims[{i}].search_queries"),
                &sub.search_queries,
                1,
                MAX_QUERIES_PER_SUB_CLAIM,
            )?;
            for (j, query) in sub.search_queries.iter().enumerate() {
                check_non_empty(&format!("sub_claims[{i}].search_queries[{j}]"), query)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(claim: &str, queries: &[&str]) -> SubClaim {
        SubClaim {
            claim: claim.to_string(),
            search_queries: queries.iter().map(|q| q.to_string()).collect(),
        }
    }

    #[test]
    fn zero_sub_claims_is_a_violation() {
        let decomposition = ClaimDecomposition {
            original_claim: "x".to_string(),
            claim_type: ClaimType::Factual,
            language: "en".to_string(),
            sub_claims: Vec::new(),
        };
        let err = decomposition.validate().unwrap_err();
        assert_eq!(err.field, "sub_claims");
    }

    #[test]
    fn too_many_queries_names_the_offending_sub_claim() {
        let decomposition = ClaimDecomposition {
            original_claim: "x".to_string(),
            claim_type: ClaimType::Mixed,
            language: "en".to_string(),
            sub_claims: vec![sub("a", &["q"]), sub("b", &["1", "2", "3", "4"])],
        };
        let err = decomposition.validate().unwrap_err();
        assert_eq!(err.field, "sub_claims[1].search_queries");
    }

    #[test]
    fn language_defaults_when_missing() {
        let raw = r#"{"original_claim": "c", "claim_type": "prediction",
            "sub_claims": [{"claim": "c", "search_queries": ["q"]}]}"#;
        let parsed: ClaimDecomposition = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.language, "en");
        assert_eq!(parsed.claim().claim_type, ClaimType::Prediction);
        assert!(parsed.validate().is_ok());
    }
}
