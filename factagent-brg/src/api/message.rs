use chrono::Utc;
use factagent::db::SimilarCheck;
use factagent::models::{FactCheckResult, SubClaimVerdict, Verdict};
use serde::{Deserialize, Serialize};

/// Wire protocol. Every frame is `{"type": ..., "id": ..., "ts": ..., "payload": {...}}`;
/// `id` is the check id chosen by the client and echoed on every reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    CheckRequest {
        id: String,
        ts: String,
        payload: CheckRequestPayload,
    },
    StageUpdate {
        id: String,
        ts: String,
        payload: StageUpdatePayload,
    },
    ReviewRequest {
        id: String,
        ts: String,
        payload: ReviewRequestPayload,
    },
    ReviewResponse {
        id: String,
        ts: String,
        payload: ReviewResponsePayload,
    },
    CheckResult {
        id: String,
        ts: String,
        payload: CheckResultPayload,
    },
    CheckError {
        id: String,
        ts: String,
        payload: CheckErrorPayload,
    },
}

pub fn now() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckRequestPayload {
    pub claim: String,
    #[serde(default)]
    pub session: Option<String>,
    /// Ask the client to review every sub-verdict before synthesis.
    #[serde(default)]
    pub review: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageUpdatePayload {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequestPayload {
    pub index: usize,
    pub total: usize,
    pub verdict: SubClaimVerdict,
}

/// No verdict and no comment accepts the automated verdict.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponsePayload {
    pub index: usize,
    #[serde(default)]
    pub corrected_verdict: Option<Verdict>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarClaim {
    pub claim: String,
    pub verdict: Verdict,
    pub score: f32,
}

impl From<&SimilarCheck> for SimilarClaim {
    fn from(similar: &SimilarCheck) -> Self {
        Self {
            claim: similar.check.claim.clone(),
            verdict: similar.check.result.overall_verdict,
            score: similar.score,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckResultPayload {
    pub result: FactCheckResult,
    pub cached: bool,
    pub human_reviewed: bool,
    pub duration_secs: f64,
    #[serde(default)]
    pub similar: Vec<SimilarClaim>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckErrorPayload {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_request_uses_type_tag_and_defaults() {
        let raw = r#"{"type": "check_request", "id": "c1", "ts": "t",
            "payload": {"claim": "The capital of France is Paris."}}"#;
        let parsed: Message = serde_json::from_str(raw).unwrap();
        let Message::CheckRequest { id, payload, .. } = parsed else {
            panic!("wrong variant");
        };
        assert_eq!(id, "c1");
        assert!(!payload.review);
        assert!(payload.session.is_none());
    }

    #[test]
    fn review_response_accepts_with_empty_payload() {
        let raw = r#"{"type": "review_response", "id": "c1", "ts": "t", "payload": {"index": 2}}"#;
        let parsed: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed,
            Message::ReviewResponse {
                id: "c1".to_string(),
                ts: "t".to_string(),
                payload: ReviewResponsePayload {
                    index: 2,
                    ..ReviewResponsePayload::default()
                },
            }
        );
    }

    #[test]
    fn stage_update_serializes_snake_case_type() {
        let msg = Message::StageUpdate {
            id: "c1".to_string(),
            ts: "t".to_string(),
            payload: StageUpdatePayload {
                stage: "retrieve".to_string(),
                detail: None,
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "stage_update");
        assert_eq!(value["payload"]["stage"], "retrieve");
        assert!(value["payload"].get("detail").is_none());
    }
}
