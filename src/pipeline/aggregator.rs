use crate::models::EvidenceRecord;
use crate::pipeline::traits::{EvidenceProvider, SearchHit};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug)]
pub struct AggregatorConfig {
    pub max_results_per_query: usize,
    /// Content excerpts are cut to this many characters.
    pub excerpt_chars: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_results_per_query: 5,
            excerpt_chars: 500,
        }
    }
}

pub struct EvidenceAggregator<P> {
    provider: P,
    config: AggregatorConfig,
}

impl<P: EvidenceProvider> EvidenceAggregator<P> {
    pub fn new(provider: P, config: AggregatorConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Searches every query in turn and returns the merged evidence set.
    ///
    /// A failing query is logged and skipped. If all of them fail the set is
    /// simply empty.
    pub async fn gather(&self, queries: &[String]) -> Vec<EvidenceRecord> {
        let mut batches = Vec::with_capacity(queries.len());
        for query in queries {
            match self
                .provider
                .search(query, self.config.max_results_per_query)
                .await
            {
                Ok(hits) => {
                    debug!(query = %query, hits = hits.len(), "search done");
                    batches.push((query.clone(), hits));
                }
                Err(e) => warn!(query = %query, error = %e, "search failed, skipping query"),
            }
        }
        merge_hits(batches, self.config.excerpt_chars)
    }
}

/// Deduplicates by URL (first appearance wins), truncates excerpts and sorts
/// by descending score. Ties keep their order of first appearance.
pub fn merge_hits(batches: Vec<(String, Vec<SearchHit>)>, excerpt_chars: usize) -> Vec<EvidenceRecord> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for (query, hits) in batches {
        for hit in hits {
            if !seen.insert(hit.url.clone()) {
                continue;
            }
            merged.push(EvidenceRecord {
                content: truncate_chars(&hit.content, excerpt_chars),
                score: if hit.score.is_finite() { hit.score } else { 0.0 },
                url: hit.url,
                title: hit.title,
                query: query.clone(),
            });
        }
    }
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
