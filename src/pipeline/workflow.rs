use crate::error::FactCheckError;
use crate::models::{
    ClaimDecomposition, EvidenceRecord, FactCheckResult, HumanFeedback, SubClaimFeedback,
    SubClaimVerdict, Synthesis,
};
use crate::pipeline::aggregator::EvidenceAggregator;
use crate::pipeline::coercion::SchemaCoercionEngine;
use crate::pipeline::merger::merge_feedback;
use crate::pipeline::prompts;
use crate::pipeline::traits::{
    EvidenceProvider, HumanReviewer, ProgressObserver, ReasoningEngine, ReviewDecision,
};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, info, warn};

pub const NO_SOURCES_CONFIDENCE: f32 = 0.1;
pub const NO_SOURCES_REASONING: &str = "No relevant sources found.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Decompose,
    Retrieve,
    Evaluate,
    Synthesize,
    Done,
    Error(String),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Decompose => "decompose",
            Stage::Retrieve => "retrieve",
            Stage::Evaluate => "evaluate",
            Stage::Synthesize => "synthesize",
            Stage::Done => "done",
            Stage::Error(_) => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Error(reason) => write!(f, "error: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Everything one claim check accumulates on its way through the stages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowState {
    pub claim: String,
    pub decomposition: Option<ClaimDecomposition>,
    /// Evidence per sub-claim text.
    pub evidence: HashMap<String, Vec<EvidenceRecord>>,
    pub sub_verdicts: Vec<SubClaimVerdict>,
    pub human_feedback: Option<HumanFeedback>,
    pub final_result: Option<FactCheckResult>,
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn new(claim: &str) -> Self {
        Self {
            claim: claim.to_string(),
            ..Self::default()
        }
    }

    /// Pre-seeds reviewer feedback, which suppresses interactive review.
    pub fn with_feedback(mut self, feedback: HumanFeedback) -> Self {
        self.human_feedback = Some(feedback);
        self
    }

    /// Folds a stage's output into the state. A recorded error is never
    /// cleared, and once one exists no final result is accepted.
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(decomposition) = delta.decomposition {
            self.decomposition = Some(decomposition);
        }
        if let Some(evidence) = delta.evidence {
            self.evidence.extend(evidence);
        }
        if let Some(sub_verdicts) = delta.sub_verdicts {
            self.sub_verdicts = sub_verdicts;
        }
        if let Some(feedback) = delta.human_feedback {
            self.human_feedback = Some(feedback);
        }
        if self.error.is_none() {
            self.error = delta.error;
        }
        if self.error.is_none() {
            if let Some(result) = delta.final_result {
                self.final_result = Some(result);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct StateDelta {
    pub decomposition: Option<ClaimDecomposition>,
    pub evidence: Option<HashMap<String, Vec<EvidenceRecord>>>,
    pub sub_verdicts: Option<Vec<SubClaimVerdict>>,
    pub human_feedback: Option<HumanFeedback>,
    pub final_result: Option<FactCheckResult>,
    pub error: Option<String>,
}

impl StateDelta {
    fn failed(error: FactCheckError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Routing after `current` has run. Any recorded error wins.
pub fn next_stage(current: &Stage, state: &WorkflowState) -> Stage {
    if current.is_terminal() {
        return current.clone();
    }
    if let Some(reason) = &state.error {
        return Stage::Error(reason.clone());
    }
    match current {
        Stage::Decompose => match &state.decomposition {
            Some(d) if !d.sub_claims.is_empty() => Stage::Retrieve,
            _ => Stage::Error(
                FactCheckError::DecompositionFailure("no sub-claims".to_string()).to_string(),
            ),
        },
        Stage::Retrieve => Stage::Evaluate,
        Stage::Evaluate if state.sub_verdicts.is_empty() => {
            Stage::Error(FactCheckError::EmptyEvaluation.to_string())
        }
        Stage::Evaluate => Stage::Synthesize,
        Stage::Synthesize if state.final_result.is_some() => Stage::Done,
        Stage::Synthesize => Stage::Error(
            FactCheckError::SynthesisFailure("no result produced".to_string()).to_string(),
        ),
        Stage::Done | Stage::Error(_) => current.clone(),
    }
}

/// Optional collaborators for one run.
#[derive(Clone, Copy, Default)]
pub struct RunHooks<'a> {
    pub reviewer: Option<&'a dyn HumanReviewer>,
    pub observer: Option<&'a dyn ProgressObserver>,
}

impl<'a> RunHooks<'a> {
    pub fn with_reviewer(mut self, reviewer: &'a dyn HumanReviewer) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }
}

#[derive(Clone, Debug)]
pub struct WorkflowOutcome {
    pub stage: Stage,
    pub state: WorkflowState,
}

impl WorkflowOutcome {
    pub fn into_result(self) -> Result<FactCheckResult, String> {
        match (self.stage, self.state.final_result) {
            (Stage::Done, Some(result)) => Ok(result),
            (Stage::Error(reason), _) => Err(reason),
            (stage, _) => Err(format!("check stopped in stage {stage}")),
        }
    }
}

pub struct FactCheckWorkflow<E, P> {
    coercion: SchemaCoercionEngine<E>,
    aggregator: EvidenceAggregator<P>,
}

impl<E, P> FactCheckWorkflow<E, P>
where
    E: ReasoningEngine,
    P: EvidenceProvider,
{
    pub fn new(coercion: SchemaCoercionEngine<E>, aggregator: EvidenceAggregator<P>) -> Self {
        Self {
            coercion,
            aggregator,
        }
    }

    pub fn coercion(&self) -> &SchemaCoercionEngine<E> {
        &self.coercion
    }

    pub fn aggregator(&self) -> &EvidenceAggregator<P> {
        &self.aggregator
    }

    pub async fn run(&self, claim: &str, hooks: RunHooks<'_>) -> WorkflowOutcome {
        self.run_state(WorkflowState::new(claim), hooks).await
    }

    /// Drives `state` from Decompose until a terminal stage.
    pub async fn run_state(&self, mut state: WorkflowState, hooks: RunHooks<'_>) -> WorkflowOutcome {
        let mut stage = Stage::Decompose;
        loop {
            if let Some(observer) = hooks.observer {
                observer.on_stage(&stage);
            }
            if stage.is_terminal() {
                break;
            }
            info!(stage = stage.name(), "entering stage");
            let delta = match stage {
                Stage::Decompose => self.decompose(&state, hooks.observer).await,
                Stage::Retrieve => self.retrieve(&state).await,
                Stage::Evaluate => self.evaluate(&state, hooks.observer).await,
                Stage::Synthesize => {
                    if let Some(reviewer) = hooks.reviewer {
                        if state.human_feedback.is_none() {
                            let feedback = collect_review(reviewer, &state.sub_verdicts).await;
                            state.apply(StateDelta {
                                human_feedback: feedback,
                                ..StateDelta::default()
                            });
                        }
                    }
                    self.synthesize(&state, hooks.observer).await
                }
                Stage::Done | Stage::Error(_) => StateDelta::default(),
            };
            state.apply(delta);
            stage = next_stage(&stage, &state);
        }

        match &stage {
            Stage::Error(reason) => error!(claim = %state.claim, %reason, "check failed"),
            _ => info!(claim = %state.claim, "check complete"),
        }
        WorkflowOutcome { stage, state }
    }

    async fn decompose(
        &self,
        state: &WorkflowState,
        observer: Option<&dyn ProgressObserver>,
    ) -> StateDelta {
        let result = self
            .coercion
            .coerce::<ClaimDecomposition>(
                prompts::DECOMPOSER_ROLE,
                &prompts::decomposer_task(&state.claim),
                observer,
            )
            .await;
        match result {
            Ok(decomposition) => {
                let claim = decomposition.claim();
                info!(
                    sub_claims = decomposition.sub_claims.len(),
                    queries = decomposition.query_count(),
                    claim_type = ?claim.claim_type,
                    language = %claim.language,
                    "claim decomposed"
                );
                StateDelta {
                    decomposition: Some(decomposition),
                    ..StateDelta::default()
                }
            }
            Err(e) => StateDelta::failed(FactCheckError::DecompositionFailure(e.to_string())),
        }
    }

    async fn retrieve(&self, state: &WorkflowState) -> StateDelta {
        let mut evidence = HashMap::new();
        for sub in state.decomposition.iter().flat_map(|d| &d.sub_claims) {
            let records = self.aggregator.gather(&sub.search_queries).await;
            info!(sub_claim = %sub.claim, records = records.len(), "evidence gathered");
            evidence.insert(sub.claim.clone(), records);
        }
        StateDelta {
            evidence: Some(evidence),
            ..StateDelta::default()
        }
    }

    async fn evaluate(
        &self,
        state: &WorkflowState,
        observer: Option<&dyn ProgressObserver>,
    ) -> StateDelta {
        let mut verdicts = Vec::new();
        for sub in state.decomposition.iter().flat_map(|d| &d.sub_claims) {
            let evidence = state
                .evidence
                .get(&sub.claim)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if evidence.is_empty() {
                info!(sub_claim = %sub.claim, "no evidence, marking unverifiable");
                verdicts.push(SubClaimVerdict::unverifiable(
                    &sub.claim,
                    NO_SOURCES_CONFIDENCE,
                    NO_SOURCES_REASONING,
                ));
                continue;
            }

            let result = self
                .coercion
                .coerce::<SubClaimVerdict>(
                    prompts::EVALUATOR_ROLE,
                    &prompts::evaluator_task(&sub.claim, evidence),
                    observer,
                )
                .await;
            match result {
                Ok(mut verdict) => {
                    verdict.claim = sub.claim.clone();
                    info!(sub_claim = %sub.claim, verdict = %verdict.verdict, confidence = verdict.confidence, "sub-claim evaluated");
                    verdicts.push(verdict);
                }
                Err(e) => {
                    let gap = FactCheckError::EvaluationGap {
                        claim: sub.claim.clone(),
                        reason: e.to_string(),
                    };
                    warn!(%gap, "recovering evaluation gap");
                    verdicts.push(SubClaimVerdict::unverifiable(
                        &sub.claim,
                        0.0,
                        format!("Evaluation failed: {e}"),
                    ));
                }
            }
        }
        StateDelta {
            sub_verdicts: Some(verdicts),
            ..StateDelta::default()
        }
    }

    async fn synthesize(
        &self,
        state: &WorkflowState,
        observer: Option<&dyn ProgressObserver>,
    ) -> StateDelta {
        let merged = merge_feedback(state.sub_verdicts.clone(), state.human_feedback.as_ref());
        let result = self
            .coercion
            .coerce::<Synthesis>(
                prompts::SYNTHESIZER_ROLE,
                &prompts::synthesizer_task(&state.claim, &merged.sub_verdicts, &merged.review_note),
                observer,
            )
            .await;
        match result {
            Ok(synthesis) => {
                let result = synthesis.into_result(&state.claim, merged.sub_verdicts.clone());
                info!(
                    verdict = %result.overall_verdict,
                    confidence = result.confidence,
                    corrections = merged.applied,
                    "verdict synthesized"
                );
                StateDelta {
                    sub_verdicts: Some(merged.sub_verdicts),
                    final_result: Some(result),
                    ..StateDelta::default()
                }
            }
            Err(e) => StateDelta {
                sub_verdicts: Some(merged.sub_verdicts),
                error: Some(FactCheckError::SynthesisFailure(e.to_string()).to_string()),
                ..StateDelta::default()
            },
        }
    }
}

/// Walks the reviewer through every sub-verdict. Any reviewer error means
/// the check continues unreviewed.
async fn collect_review(
    reviewer: &dyn HumanReviewer,
    sub_verdicts: &[SubClaimVerdict],
) -> Option<HumanFeedback> {
    let total = sub_verdicts.len();
    let mut entries = Vec::with_capacity(total);
    for (index, verdict) in sub_verdicts.iter().enumerate() {
        let decision = match reviewer.review(index, total, verdict).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "human review aborted, continuing without it");
                return None;
            }
        };
        let (corrected_verdict, user_comment) = match decision {
            ReviewDecision::Accept => (None, None),
            ReviewDecision::Correct { verdict, comment } => (verdict, comment),
        };
        entries.push(SubClaimFeedback {
            claim: verdict.claim.clone(),
            corrected_verdict,
            user_comment,
        });
    }
    let general_comment = match reviewer.general_comment().await {
        Ok(comment) => comment,
        Err(e) => {
            warn!(error = %e, "reviewer comment unavailable");
            None
        }
    };
    let feedback = HumanFeedback {
        reviewed: true,
        sub_claim_feedback: entries,
        general_comment,
    };
    info!(corrections = feedback.correction_count(), total, "human review collected");
    Some(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClaimType, SubClaim, Verdict};

    fn decomposition(claims: &[&str]) -> ClaimDecomposition {
        ClaimDecomposition {
            original_claim: "c".to_string(),
            claim_type: ClaimType::Factual,
            language: "en".to_string(),
            sub_claims: claims
                .iter()
                .map(|c| SubClaim {
                    claim: c.to_string(),
                    search_queries: vec![format!("{c}?")],
                })
                .collect(),
        }
    }

    fn result() -> FactCheckResult {
        FactCheckResult {
            original_claim: "c".to_string(),
            overall_verdict: Verdict::True,
            confidence: 0.9,
            sub_verdicts: Vec::new(),
            summary: "s".to_string(),
            key_sources: Vec::new(),
        }
    }

    #[test]
    fn routing_follows_the_stage_order() {
        let mut state = WorkflowState::new("c");
        state.decomposition = Some(decomposition(&["a"]));
        assert_eq!(next_stage(&Stage::Decompose, &state), Stage::Retrieve);
        assert_eq!(next_stage(&Stage::Retrieve, &state), Stage::Evaluate);
        state.sub_verdicts = vec![SubClaimVerdict::unverifiable("a", 0.1, "r")];
        assert_eq!(next_stage(&Stage::Evaluate, &state), Stage::Synthesize);
        state.final_result = Some(result());
        assert_eq!(next_stage(&Stage::Synthesize, &state), Stage::Done);
        assert_eq!(next_stage(&Stage::Done, &state), Stage::Done);
    }

    #[test]
    fn empty_decomposition_routes_to_error() {
        let mut state = WorkflowState::new("c");
        assert!(matches!(next_stage(&Stage::Decompose, &state), Stage::Error(_)));
        state.decomposition = Some(decomposition(&[]));
        assert!(matches!(next_stage(&Stage::Decompose, &state), Stage::Error(_)));
    }

    #[test]
    fn empty_verdicts_never_reach_synthesize() {
        let state = WorkflowState::new("c");
        assert_eq!(
            next_stage(&Stage::Evaluate, &state),
            Stage::Error("no sub-claim could be evaluated".to_string())
        );
    }

    #[test]
    fn recorded_error_wins_over_routing() {
        let mut state = WorkflowState::new("c");
        state.decomposition = Some(decomposition(&["a"]));
        state.error = Some("boom".to_string());
        assert_eq!(next_stage(&Stage::Retrieve, &state), Stage::Error("boom".to_string()));
    }

    #[test]
    fn error_is_sticky_and_blocks_final_result() {
        let mut state = WorkflowState::new("c");
        state.apply(StateDelta {
            error: Some("first".to_string()),
            ..StateDelta::default()
        });
        state.apply(StateDelta {
            error: Some("second".to_string()),
            final_result: Some(result()),
            ..StateDelta::default()
        });
        assert_eq!(state.error.as_deref(), Some("first"));
        assert!(state.final_result.is_none());
    }

    #[test]
    fn deltas_only_add() {
        let mut state = WorkflowState::new("c");
        state.apply(StateDelta {
            decomposition: Some(decomposition(&["a"])),
            ..StateDelta::default()
        });
        state.apply(StateDelta::default());
        assert!(state.decomposition.is_some());
        assert_eq!(state.claim, "c");
    }

    #[test]
    fn outcome_without_result_is_an_error() {
        let outcome = WorkflowOutcome {
            stage: Stage::Error("decomposition failed: x".to_string()),
            state: WorkflowState::new("c"),
        };
        assert_eq!(outcome.into_result().unwrap_err(), "decomposition failed: x");
    }
}
