use factagent::db::{CheckStore, WalCheckStore};
use factagent::guard::{GuardLimits, SessionGuard};
use factagent::models::{FactCheckResult, Verdict};
use factagent::pipeline::mock::{hit, ScriptedEngine, StaticProvider};
use factagent::pipeline::{AggregatorConfig, EvidenceAggregator, FactCheckWorkflow, SchemaCoercionEngine};
use factagent::{CheckOutcome, FactChecker, GuardRejection};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

const CLAIM: &str = "Mount Everest is the highest mountain on Earth.";

type TestChecker = FactChecker<ScriptedEngine, StaticProvider, WalCheckStore>;

fn replies() -> Vec<String> {
    vec![
        json!({
            "original_claim": CLAIM,
            "claim_type": "factual",
            "sub_claims": [{"claim": CLAIM, "search_queries": ["highest mountain"]}]
        })
        .to_string(),
        json!({
            "claim": CLAIM,
            "verdict": "true",
            "confidence": 0.97,
            "evidence": [],
            "reasoning": "Everest is 8849 m above sea level."
        })
        .to_string(),
        json!({
            "original_claim": CLAIM,
            "overall_verdict": "true",
            "confidence": 0.96,
            "sub_verdicts": [],
            "summary": "Everest is the highest mountain above sea level.",
            "key_sources": []
        })
        .to_string(),
    ]
}

fn checker(dir: &TempDir, replies: Vec<String>, max_checks: u32) -> TestChecker {
    let provider = StaticProvider::new().with_hits(
        "highest mountain",
        vec![hit("https://en.wikipedia.org/wiki/Mount_Everest", "Mount Everest", "8,849 m", 0.9)],
    );
    let workflow = FactCheckWorkflow::new(
        SchemaCoercionEngine::new(ScriptedEngine::new(replies)),
        EvidenceAggregator::new(provider, AggregatorConfig::default()),
    );
    let store = WalCheckStore::open(dir.path().join("checks.wal")).unwrap();
    let guard = SessionGuard::new(GuardLimits {
        max_checks_per_session: max_checks,
        min_interval: Duration::ZERO,
    });
    FactChecker::new(workflow, store, guard)
}

fn calls(checker: &TestChecker) -> usize {
    checker.workflow().coercion().engine().calls()
}

#[tokio::test]
async fn completed_check_is_stored_and_then_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(&dir, replies(), 10);

    let first = checker.check("s1", CLAIM).await;
    let CheckOutcome::Completed { result, human_reviewed, .. } = first else {
        panic!("expected a completed check");
    };
    assert_eq!(result.overall_verdict, Verdict::True);
    assert!(!human_reviewed);
    assert_eq!(calls(&checker), 3);

    let second = checker
        .check("s2", "  mount everest is the highest mountain on earth!  ")
        .await;
    let CheckOutcome::Cached(cached) = second else {
        panic!("expected a cache hit");
    };
    assert_eq!(cached.claim, CLAIM);
    assert_eq!(calls(&checker), 3);
    assert_eq!(checker.store().stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn invalid_claim_never_reaches_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(&dir, replies(), 10);

    let outcome = checker.check("s", "Too short").await;

    assert!(matches!(outcome, CheckOutcome::Rejected(GuardRejection::ClaimTooShort)));
    assert_eq!(calls(&checker), 0);
}

#[tokio::test]
async fn session_limit_applies_after_completed_checks() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(&dir, replies(), 1);

    assert!(matches!(checker.check("s", CLAIM).await, CheckOutcome::Completed { .. }));
    let outcome = checker.check("s", "K2 is the second highest mountain on Earth.").await;

    assert!(matches!(
        outcome,
        CheckOutcome::Rejected(GuardRejection::SessionLimit { limit: 1 })
    ));
    assert!(checker.guard().check("other").is_ok());
}

#[tokio::test]
async fn concurrent_checks_share_one_session_slot() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StaticProvider::new().with_hits(
        "highest mountain",
        vec![hit("https://en.wikipedia.org/wiki/Mount_Everest", "Mount Everest", "8,849 m", 0.9)],
    );
    let workflow = FactCheckWorkflow::new(
        SchemaCoercionEngine::new(ScriptedEngine::new(replies())),
        EvidenceAggregator::new(provider, AggregatorConfig::default()),
    );
    let store = WalCheckStore::open(dir.path().join("checks.wal")).unwrap();
    let guard = SessionGuard::new(GuardLimits {
        max_checks_per_session: 1,
        min_interval: Duration::from_secs(30),
    });
    let checker = FactChecker::new(workflow, store, guard);
    let louder = format!("{CLAIM}!!");

    let (first, second) = tokio::join!(checker.check("s", CLAIM), checker.check("s", &louder));

    let completed = [&first, &second]
        .iter()
        .filter(|o| matches!(o, CheckOutcome::Completed { .. }))
        .count();
    assert_eq!(completed, 1);
    assert!(matches!(
        second,
        CheckOutcome::Rejected(GuardRejection::SessionLimit { limit: 1 })
    ));
    assert_eq!(calls(&checker), 3);
}

#[tokio::test]
async fn failed_check_is_neither_stored_nor_counted() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(&dir, vec!["x".into(), "y".into(), "z".into()], 1);

    let outcome = checker.check("s", CLAIM).await;

    let CheckOutcome::Failed { error, .. } = outcome else {
        panic!("expected a failed check");
    };
    assert!(error.starts_with("decomposition failed"));
    assert_eq!(checker.store().stats().await.unwrap().total, 0);
    assert!(checker.guard().check("s").is_ok());
}

#[tokio::test]
async fn similar_checks_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(&dir, replies(), 10);
    let earlier = FactCheckResult {
        original_claim: "Mount Everest is the tallest mountain".to_string(),
        overall_verdict: Verdict::PartiallyTrue,
        confidence: 0.7,
        sub_verdicts: Vec::new(),
        summary: "Depends on how height is measured.".to_string(),
        key_sources: Vec::new(),
    };
    checker
        .store()
        .store("Mount Everest is the tallest mountain", &earlier, true, Duration::from_secs(12))
        .await
        .unwrap();

    let outcome = checker.check("s", CLAIM).await;

    let CheckOutcome::Completed { similar, .. } = outcome else {
        panic!("expected a completed check");
    };
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].check.result.overall_verdict, Verdict::PartiallyTrue);
}
