pub mod aggregator;
pub mod coercion;
pub mod fetch;
pub mod llm;
pub mod merger;
pub mod mock;
pub mod prompts;
pub mod repair;
pub mod traits;
pub mod workflow;

pub use aggregator::{AggregatorConfig, EvidenceAggregator};
pub use coercion::SchemaCoercionEngine;
pub use fetch::TavilyProvider;
pub use llm::OpenAiEngine;
pub use merger::{merge_feedback, MergeOutcome};
pub use traits::{
    EngineRequest, EvidenceProvider, HumanReviewer, ProgressObserver, ReasoningEngine,
    ReviewDecision, SearchHit, TokenStream,
};
pub use workflow::{
    FactCheckWorkflow, RunHooks, Stage, StateDelta, WorkflowOutcome, WorkflowState,
};
