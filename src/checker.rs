use crate::config::Config;
use crate::db::{CheckStore, SimilarCheck, StoredCheck, WalCheckStore};
use crate::error::GuardRejection;
use crate::guard::{validate_claim, GuardLimits, SessionGuard};
use crate::models::{FactCheckResult, HumanFeedback};
use crate::pipeline::{
    AggregatorConfig, EvidenceAggregator, EvidenceProvider, FactCheckWorkflow, OpenAiEngine,
    ReasoningEngine, RunHooks, SchemaCoercionEngine, Stage, TavilyProvider, WorkflowState,
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const SIMILAR_LIMIT: usize = 3;

#[derive(Clone, Debug)]
pub enum CheckOutcome {
    /// The same claim was checked before; nothing was run.
    Cached(StoredCheck),
    Completed {
        result: FactCheckResult,
        similar: Vec<SimilarCheck>,
        human_reviewed: bool,
        duration: Duration,
    },
    Failed {
        error: String,
        similar: Vec<SimilarCheck>,
    },
    Rejected(GuardRejection),
}

/// Entry point for one claim check: guard, cache, workflow, persistence.
/// A session's slot is taken on admission and handed back unless the check
/// completes.
pub struct FactChecker<E, P, S> {
    workflow: FactCheckWorkflow<E, P>,
    store: S,
    guard: SessionGuard,
}

impl<E, P, S> FactChecker<E, P, S>
where
    E: ReasoningEngine,
    P: EvidenceProvider,
    S: CheckStore,
{
    pub fn new(workflow: FactCheckWorkflow<E, P>, store: S, guard: SessionGuard) -> Self {
        Self {
            workflow,
            store,
            guard,
        }
    }

    pub fn workflow(&self) -> &FactCheckWorkflow<E, P> {
        &self.workflow
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub async fn check(&self, session: &str, claim: &str) -> CheckOutcome {
        self.check_with(session, claim, None, RunHooks::default()).await
    }

    pub async fn check_with(
        &self,
        session: &str,
        claim: &str,
        feedback: Option<HumanFeedback>,
        hooks: RunHooks<'_>,
    ) -> CheckOutcome {
        let claim = match validate_claim(claim) {
            Ok(claim) => claim,
            Err(rejection) => return CheckOutcome::Rejected(rejection),
        };
        let reservation = match self.guard.admit(session) {
            Ok(reservation) => reservation,
            Err(rejection) => {
                info!(session, %rejection, "check rejected by session guard");
                return CheckOutcome::Rejected(rejection);
            }
        };

        match self.store.find_exact(claim).await {
            Ok(Some(cached)) => {
                info!(id = %cached.id, "returning cached check");
                self.guard.release(reservation);
                return CheckOutcome::Cached(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "exact lookup failed"),
        }
        let similar = self
            .store
            .find_similar(claim, SIMILAR_LIMIT)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "similar lookup failed");
                Vec::new()
            });

        let started = Instant::now();
        let mut state = WorkflowState::new(claim);
        if let Some(feedback) = feedback {
            state = state.with_feedback(feedback);
        }
        let outcome = self.workflow.run_state(state, hooks).await;
        let duration = started.elapsed();

        let human_reviewed = outcome
            .state
            .human_feedback
            .as_ref()
            .is_some_and(|f| f.reviewed);
        match (outcome.stage, outcome.state.final_result) {
            (Stage::Done, Some(result)) => {
                if let Err(e) = self.store.store(claim, &result, human_reviewed, duration).await {
                    warn!(error = %e, "could not persist check");
                }
                self.guard.commit(reservation);
                CheckOutcome::Completed {
                    result,
                    similar,
                    human_reviewed,
                    duration,
                }
            }
            (stage, _) => {
                self.guard.release(reservation);
                let error = match stage {
                    Stage::Error(error) => error,
                    stage => format!("check stopped in stage {stage}"),
                };
                CheckOutcome::Failed { error, similar }
            }
        }
    }
}

pub type LiveChecker = FactChecker<OpenAiEngine, TavilyProvider, WalCheckStore>;

/// Wires the production collaborators from `config`.
pub fn build_checker(config: &Config) -> anyhow::Result<LiveChecker> {
    let engine = OpenAiEngine::new(
        config.require_openai_key()?,
        &config.model,
        config.api_base.as_deref(),
    );
    info!(model = engine.model(), "reasoning engine ready");
    let coercion = SchemaCoercionEngine::new(engine)
        .with_max_retries(config.max_retries)
        .with_max_tokens(config.max_tokens);
    let provider = TavilyProvider::new(config.require_tavily_key()?, config.search_url.clone())?;
    let aggregator = EvidenceAggregator::new(
        provider,
        AggregatorConfig {
            max_results_per_query: config.max_results,
            excerpt_chars: config.excerpt_chars,
        },
    );
    let store = WalCheckStore::open(&config.store_path)?;
    let guard = SessionGuard::new(GuardLimits {
        max_checks_per_session: config.max_checks_per_session,
        min_interval: Duration::from_secs(config.min_seconds_between_checks),
    });
    Ok(FactChecker::new(
        FactCheckWorkflow::new(coercion, aggregator),
        store,
        guard,
    ))
}
