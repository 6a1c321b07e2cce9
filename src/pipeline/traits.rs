use crate::models::{SubClaimVerdict, Verdict};
use crate::pipeline::workflow::Stage;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// One structured call as sent to the reasoning engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineRequest {
    pub role_instruction: String,
    pub task_instruction: String,
    /// JSON schema of the record the reply must match.
    pub shape: serde_json::Value,
    pub max_tokens: u32,
}

pub type TokenStream = BoxStream<'static, anyhow::Result<String>>;

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn stream(&self, request: &EngineRequest) -> anyhow::Result<TokenStream>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// Web search. An empty result and an error both mean "nothing for this query".
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReviewDecision {
    Accept,
    Correct {
        verdict: Option<Verdict>,
        comment: Option<String>,
    },
}

#[async_trait]
pub trait HumanReviewer: Send + Sync {
    /// Shows sub-verdict `index` of `total` and waits for the reviewer's decision.
    async fn review(
        &self,
        index: usize,
        total: usize,
        verdict: &SubClaimVerdict,
    ) -> anyhow::Result<ReviewDecision>;

    async fn general_comment(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Progress side channel. Nothing in the pipeline depends on it.
pub trait ProgressObserver: Send + Sync {
    fn on_token(&self, _token: &str) {}

    fn on_stage(&self, _stage: &Stage) {}
}
