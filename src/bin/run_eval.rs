use clap::Parser;
use dotenv::dotenv;
use factagent::pipeline::RunHooks;
use factagent::{build_checker, Config};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "run_eval", about = "Run the fact checker against a labelled claim set")]
struct Args {
    #[arg(long, default_value = "eval/eval_set.json")]
    input: PathBuf,
    #[arg(long, default_value = "eval/eval_results.json")]
    output: PathBuf,
    /// Only run the first N claims.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct EvalSet {
    claims: Vec<EvalCase>,
}

#[derive(Deserialize)]
struct EvalCase {
    id: serde_json::Value,
    claim: String,
    expected_verdict: String,
}

#[derive(Serialize)]
struct EvalRow {
    id: serde_json::Value,
    claim: String,
    expected: String,
    actual: String,
    confidence: f32,
    #[serde(rename = "match")]
    matched: bool,
    time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct EvalReport {
    accuracy: f64,
    correct: usize,
    total: usize,
    results: Vec<EvalRow>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let mut set: EvalSet = serde_json::from_str(&fs::read_to_string(&args.input)?)?;
    if let Some(limit) = args.limit {
        set.claims.truncate(limit);
    }

    // Cache and guard would skew the numbers; the workflow runs directly.
    let checker = build_checker(&config)?;
    let workflow = checker.workflow();
    let total = set.claims.len();
    let mut correct = 0;
    let mut results = Vec::with_capacity(total);

    for (i, case) in set.claims.into_iter().enumerate() {
        println!("[{}/{}] {}", i + 1, total, case.claim);
        let started = Instant::now();
        let outcome = workflow.run(&case.claim, RunHooks::default()).await;
        let time_seconds = (started.elapsed().as_secs_f64() * 10.0).round() / 10.0;

        let row = match outcome.into_result() {
            Ok(result) => {
                let actual = result.overall_verdict.to_string();
                let matched = actual == case.expected_verdict;
                if matched {
                    correct += 1;
                }
                println!(
                    "  expected {}, got {} ({:.0}%) {} ({time_seconds}s)",
                    case.expected_verdict,
                    actual,
                    result.confidence * 100.0,
                    if matched { "ok" } else { "MISS" }
                );
                EvalRow {
                    id: case.id,
                    claim: case.claim,
                    expected: case.expected_verdict,
                    actual,
                    confidence: result.confidence,
                    matched,
                    time_seconds,
                    error: None,
                }
            }
            Err(error) => {
                println!("  error: {error} ({time_seconds}s)");
                EvalRow {
                    id: case.id,
                    claim: case.claim,
                    expected: case.expected_verdict,
                    actual: "error".to_string(),
                    confidence: 0.0,
                    matched: false,
                    time_seconds,
                    error: Some(error),
                }
            }
        };
        results.push(row);
    }

    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    println!("accuracy: {correct}/{total} = {:.0}%", accuracy * 100.0);

    let report = EvalReport {
        accuracy,
        correct,
        total,
        results,
    };
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, serde_json::to_string_pretty(&report)?)?;
    info!(path = %args.output.display(), "results written");
    Ok(())
}
