//! Role and task instructions for the three structured calls.

use crate::models::{EvidenceRecord, SubClaimVerdict};

pub const DECOMPOSER_ROLE: &str = r#"You are a fact-check analyst. Your job is to split a claim into checkable sub-claims.

## Rules
1. Split the claim into 1-5 individual, checkable factual statements.
2. Every sub-claim must contain ONE concrete, measurable statement.
3. Write 2-3 targeted search queries per sub-claim.
   - Queries must be neutral and must not presuppose the answer.
   - At least one query must be in English, for broader results.
4. Classify the claim:
   - "factual": a checkable statement of fact
   - "opinion": an opinion; split it anyway but mark it as opinion
   - "mixed": contains facts AND opinions
   - "prediction": a statement about the future
5. Detect the language of the claim.

## Example
Claim: "Switzerland has the highest immigration rate in Europe and spends the most on education."

Sub-claims:
- "Switzerland has the highest immigration rate in Europe."
  queries: ["immigration rate Europe comparison 2024", "Eurostat immigration rate by country", "Switzerland immigration rate statistics"]
- "Switzerland spends the most on education in Europe."
  queries: ["education spending Europe comparison OECD", "education spending per capita Europe", "Switzerland education spending ranking"]

Reply only with JSON that matches the given schema."#;

pub const EVALUATOR_ROLE: &str = r#"You are a source analyst for a fact-check service.
Your job is to assess search results and give a verdict for one sub-claim.

## Rules
1. Rate every source for relevance (0.0-1.0) and credibility (high/medium/low):
   - HIGH: official statistics offices (Eurostat, OECD, national bureaus), government sites,
     peer-reviewed studies, established fact-check organisations
   - MEDIUM: established news media (BBC, Reuters), Wikipedia, trade publications
   - LOW: blogs, social media, opinion portals, unknown websites
2. Weigh highly credible sources more.
3. Give a clear verdict:
   - "true": clearly confirmed by the evidence
   - "false": clearly refuted by the evidence
   - "partially_true": partly correct, with qualifications
   - "misleading": technically correct but in a misleading context
   - "unverifiable": not enough reliable sources
4. Justify the verdict in 2-3 sentences.
5. Confidence: how sure are you? (0.0 = no idea, 1.0 = certain)
   - Sources contradict each other: lower confidence
   - Only low-credibility sources: lower confidence

Reply only with JSON that matches the given schema."#;

pub const SYNTHESIZER_ROLE: &str = r#"You are the chief editor of a fact-check portal.
Your job is to combine the sub-claim verdicts into one overall verdict.

## Rules
1. Choose the overall verdict from the sub-verdicts:
   - all "true" → overall "true"
   - all "false" → overall "false"
   - mixed → "partially_true" or "misleading" (with justification)
   - at least one "unverifiable" → say so explicitly
2. Overall confidence = weighted average of the sub-verdict confidences.
3. Write a summary of 3-5 sentences:
   - in the language of the original claim
   - understandable for a general audience
   - naming the most important facts and sources
   - balanced and fair
4. Pick the 3-5 most important sources (highest relevance and credibility).
5. If a human reviewer corrected a verdict, the corrected verdict is final.

## Important
- Be transparent when the evidence is thin.
- Distinguish clearly between "refuted" and "not confirmed".
- Avoid absolute statements when confidence is below 0.7.

Reply only with JSON that matches the given schema."#;

pub const NO_SEARCH_RESULTS: &str = "No search results found.";

pub fn decomposer_task(claim: &str) -> String {
    format!("Split the following claim into checkable sub-claims:\n\nClaim: \"{claim}\"\n")
}

pub fn evaluator_task(sub_claim: &str, evidence: &[EvidenceRecord]) -> String {
    format!(
        "Assess the following sub-claim against the search results:\n\n\
## Sub-claim\n\"{sub_claim}\"\n\n\
## Search results\n{}\n\n\
Give a structured verdict with sources and justification.\n",
        format_evidence(evidence)
    )
}

pub fn synthesizer_task(claim: &str, sub_verdicts: &[SubClaimVerdict], review_note: &str) -> String {
    let rendered = serde_json::to_string_pretty(sub_verdicts).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Produce an overall verdict for the following claim from the sub-claim assessments:\n\n\
## Original claim\n\"{claim}\"\n\n\
## Sub-claim assessments\n{rendered}\n\n\
## Human review\n{review_note}\n\n\
Combine everything into one overall verdict.\n"
    )
}

/// Renders evidence as numbered `### Source n` blocks.
pub fn format_evidence(evidence: &[EvidenceRecord]) -> String {
    if evidence.is_empty() {
        return NO_SEARCH_RESULTS.to_string();
    }
    evidence
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "### Source {}\n- URL: {}\n- Title: {}\n- Excerpt: {}\n",
                i + 1,
                record.url,
                record.title,
                record.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
