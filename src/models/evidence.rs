use crate::error::ShapeViolation;
use crate::models::validate::{check_unit_range, Validate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One document returned by the evidence provider for a sub-claim.
///
/// `url` is the identity of a record within one sub-claim's evidence set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub query: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Credibility {
    /// Official statistics offices, government sites, peer-reviewed work, fact-check organisations.
    High,
    /// Established news media, Wikipedia, trade publications.
    Medium,
    /// Blogs, social media, unknown sites.
    Low,
}

/// A piece of evidence as judged by the evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    /// URL of the source.
    pub url: String,
    /// Title of the page or article.
    pub title: String,
    /// Relevant excerpt, at most 200 characters.
    pub snippet: String,
    /// How relevant the source is to the sub-claim, 0.0-1.0.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub relevance_score: f32,
    /// Credibility tier of the source.
    pub credibility: Credibility,
}

impl Validate for Source {
    fn validate(&self) -> Result<(), ShapeViolation> {
        check_unit_range("relevance_score", self.relevance_score)
    }
}
