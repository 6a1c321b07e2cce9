use crate::db::api::{SimilarCheck, StoreStats, StoredCheck};
use std::collections::{HashMap, HashSet};

pub const MIN_SIMILARITY: f32 = 0.3;

/// Lowercases, collapses whitespace and drops trailing `.!?;:`.
pub fn normalize_claim(claim: &str) -> String {
    let collapsed = claim
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['.', '!', '?', ';', ':'])
        .trim_end()
        .to_string()
}

fn tokens(text: &str) -> HashSet<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Jaccard overlap of the word sets of two normalized claims.
pub fn similarity(a: &str, b: &str) -> f32 {
    let left = tokens(a);
    let right = tokens(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f32 / union as f32
}

#[derive(Default, Debug)]
pub struct InMemoryIndex {
    checks: Vec<StoredCheck>,
    by_normalized: HashMap<String, Vec<usize>>,
}

impl InMemoryIndex {
    pub fn insert(&mut self, check: StoredCheck) {
        self.by_normalized
            .entry(check.claim_normalized.clone())
            .or_default()
            .push(self.checks.len());
        self.checks.push(check);
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn find_exact(&self, normalized: &str) -> Option<StoredCheck> {
        self.by_normalized
            .get(normalized)
            .and_then(|positions| positions.last())
            .map(|&i| self.checks[i].clone())
    }

    pub fn find_similar(&self, normalized: &str, limit: usize) -> Vec<SimilarCheck> {
        let mut scored: Vec<SimilarCheck> = self
            .checks
            .iter()
            .rev()
            .filter_map(|check| {
                let score = similarity(normalized, &check.claim_normalized);
                (score >= MIN_SIMILARITY).then(|| SimilarCheck {
                    check: check.clone(),
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        scored
    }

    pub fn recent(&self, limit: usize) -> Vec<StoredCheck> {
        self.checks.iter().rev().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.checks.len(),
            ..StoreStats::default()
        };
        for check in &self.checks {
            if check.human_reviewed {
                stats.human_reviewed += 1;
            }
            *stats
                .by_verdict
                .entry(check.result.overall_verdict.to_string())
                .or_default() += 1;
        }
        stats
    }
}
