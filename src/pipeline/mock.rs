use crate::models::SubClaimVerdict;
use crate::pipeline::traits::{
    EngineRequest, EvidenceProvider, HumanReviewer, ProgressObserver, ReasoningEngine,
    ReviewDecision, SearchHit, TokenStream,
};
use crate::pipeline::workflow::Stage;
use anyhow::anyhow;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Scripted {
    Reply(String),
    Refused(String),
    /// Streams `partial`, then fails with `message`.
    Broken { partial: String, message: String },
}

/// Replays canned replies in order, streamed in small chunks.
pub struct ScriptedEngine {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<EngineRequest>>,
    chunk_chars: usize,
}

impl ScriptedEngine {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Scripted::Reply(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
            chunk_chars: 7,
        }
    }

    /// Queues a transport failure for the next call.
    pub fn push_error(&self, message: &str) {
        lock(&self.replies).push_back(Scripted::Refused(message.to_string()));
    }

    /// Queues a reply whose stream breaks after `partial`.
    pub fn push_broken(&self, partial: &str, message: &str) {
        lock(&self.replies).push_back(Scripted::Broken {
            partial: partial.to_string(),
            message: message.to_string(),
        });
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Scripted::Reply(reply.into()));
    }

    fn chunks(&self, text: &str) -> Vec<anyhow::Result<String>> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.chunk_chars.max(1))
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect()
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn stream(&self, request: &EngineRequest) -> anyhow::Result<TokenStream> {
        lock(&self.requests).push(request.clone());
        let scripted = lock(&self.replies)
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))?;
        // Lets concurrent callers interleave the way a network round trip would.
        tokio::task::yield_now().await;
        let tokens = match scripted {
            Scripted::Reply(reply) => self.chunks(&reply),
            Scripted::Refused(message) => return Err(anyhow!(message)),
            Scripted::Broken { partial, message } => {
                let mut tokens = self.chunks(&partial);
                tokens.push(Err(anyhow!(message)));
                tokens
            }
        };
        Ok(stream::iter(tokens).boxed())
    }
}

/// Serves fixed hits per query. Unknown queries return nothing.
#[derive(Default)]
pub struct StaticProvider {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: Vec<String>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl EvidenceProvider for StaticProvider {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        lock(&self.queries).push((query.to_string(), max_results));
        if self.failing.iter().any(|q| q == query) {
            return Err(anyhow!("provider unavailable for {query:?}"));
        }
        Ok(self
            .hits
            .get(query)
            .map(|hits| hits.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }
}

pub fn hit(url: &str, title: &str, content: &str, score: f32) -> SearchHit {
    SearchHit {
        url: url.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        score,
    }
}

/// Answers review prompts from a fixed list, accepting anything past its end.
pub struct ScriptedReviewer {
    decisions: Vec<ReviewDecision>,
    general_comment: Option<String>,
    seen: Mutex<Vec<(usize, usize, String)>>,
}

impl ScriptedReviewer {
    pub fn new(decisions: Vec<ReviewDecision>) -> Self {
        Self {
            decisions,
            general_comment: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_general_comment(mut self, comment: &str) -> Self {
        self.general_comment = Some(comment.to_string());
        self
    }

    /// `(index, total, claim)` for every prompt shown.
    pub fn seen(&self) -> Vec<(usize, usize, String)> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl HumanReviewer for ScriptedReviewer {
    async fn review(
        &self,
        index: usize,
        total: usize,
        verdict: &SubClaimVerdict,
    ) -> anyhow::Result<ReviewDecision> {
        lock(&self.seen).push((index, total, verdict.claim.clone()));
        Ok(self
            .decisions
            .get(index)
            .cloned()
            .unwrap_or(ReviewDecision::Accept))
    }

    async fn general_comment(&self) -> anyhow::Result<Option<String>> {
        Ok(self.general_comment.clone())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    tokens: Mutex<Vec<String>>,
    stages: Mutex<Vec<Stage>>,
}

impl RecordingObserver {
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.tokens).clone()
    }

    pub fn stages(&self) -> Vec<Stage> {
        lock(&self.stages).clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_token(&self, token: &str) {
        lock(&self.tokens).push(token.to_string());
    }

    fn on_stage(&self, stage: &Stage) {
        lock(&self.stages).push(stage.clone());
    }
}
