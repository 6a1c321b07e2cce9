use crate::api::message::{
    now, Message, ReviewRequestPayload, ReviewResponsePayload, StageUpdatePayload,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use factagent::models::SubClaimVerdict;
use factagent::pipeline::{HumanReviewer, ProgressObserver, ReviewDecision, Stage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub const REVIEW_TIMEOUT: Duration = Duration::from_secs(300);

type Waiters = HashMap<(String, usize), oneshot::Sender<ReviewResponsePayload>>;

/// Review answers still awaited on one connection, keyed by `(check id, index)`.
#[derive(Clone, Default)]
pub struct PendingReviews {
    waiters: Arc<Mutex<Waiters>>,
}

impl PendingReviews {
    fn waiters(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, check_id: &str, index: usize) -> oneshot::Receiver<ReviewResponsePayload> {
        let (tx, rx) = oneshot::channel();
        self.waiters().insert((check_id.to_string(), index), tx);
        rx
    }

    fn forget(&self, check_id: &str, index: usize) {
        self.waiters().remove(&(check_id.to_string(), index));
    }

    /// Hands a client answer to the waiting reviewer. Returns false if nobody asked.
    pub fn resolve(&self, check_id: &str, response: ReviewResponsePayload) -> bool {
        let waiter = self.waiters().remove(&(check_id.to_string(), response.index));
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }
}

/// Asks the websocket client to review each sub-verdict of one check.
pub struct WsReviewer {
    check_id: String,
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingReviews,
    timeout: Duration,
}

impl WsReviewer {
    pub fn new(check_id: &str, outbound: mpsc::UnboundedSender<Message>, pending: PendingReviews) -> Self {
        Self {
            check_id: check_id.to_string(),
            outbound,
            pending,
            timeout: REVIEW_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HumanReviewer for WsReviewer {
    async fn review(
        &self,
        index: usize,
        total: usize,
        verdict: &SubClaimVerdict,
    ) -> Result<ReviewDecision> {
        let answer = self.pending.register(&self.check_id, index);
        self.outbound
            .send(Message::ReviewRequest {
                id: self.check_id.clone(),
                ts: now(),
                payload: ReviewRequestPayload {
                    index,
                    total,
                    verdict: verdict.clone(),
                },
            })
            .map_err(|_| anyhow!("connection closed"))?;
        debug!(check = %self.check_id, index, total, "review requested");

        let response = match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(anyhow!("review channel dropped")),
            Err(_) => {
                self.pending.forget(&self.check_id, index);
                return Err(anyhow!("no review answer within {:?}", self.timeout));
            }
        };
        Ok(match (response.corrected_verdict, response.comment) {
            (None, None) => ReviewDecision::Accept,
            (verdict, comment) => ReviewDecision::Correct { verdict, comment },
        })
    }
}

/// Forwards stage transitions to the client.
pub struct WsObserver {
    check_id: String,
    outbound: mpsc::UnboundedSender<Message>,
}

impl WsObserver {
    pub fn new(check_id: &str, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            check_id: check_id.to_string(),
            outbound,
        }
    }
}

impl ProgressObserver for WsObserver {
    fn on_stage(&self, stage: &Stage) {
        let detail = match stage {
            Stage::Error(reason) => Some(reason.clone()),
            _ => None,
        };
        let _ = self.outbound.send(Message::StageUpdate {
            id: self.check_id.clone(),
            ts: now(),
            payload: StageUpdatePayload {
                stage: stage.name().to_string(),
                detail,
            },
        });
    }
}
