use crate::models::{FactCheckResult, Id, IsoDateTime};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A completed check as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredCheck {
    pub id: Id,
    pub claim: String,
    pub claim_normalized: String,
    pub result: FactCheckResult,
    pub human_reviewed: bool,
    pub created_at: IsoDateTime,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimilarCheck {
    pub check: StoredCheck,
    /// Token overlap with the queried claim, 0.0-1.0.
    pub score: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub human_reviewed: usize,
    pub by_verdict: BTreeMap<String, usize>,
}

#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn store(
        &self,
        claim: &str,
        result: &FactCheckResult,
        human_reviewed: bool,
        duration: Duration,
    ) -> anyhow::Result<StoredCheck>;

    /// Newest check whose normalized claim equals the normalized `claim`.
    async fn find_exact(&self, claim: &str) -> anyhow::Result<Option<StoredCheck>>;

    /// At most `limit` related checks, best first.
    async fn find_similar(&self, claim: &str, limit: usize) -> anyhow::Result<Vec<SimilarCheck>>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<StoredCheck>>;

    async fn stats(&self) -> anyhow::Result<StoreStats>;
}
