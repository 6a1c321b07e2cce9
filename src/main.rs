use clap::{Parser, Subcommand};
use dotenv::dotenv;
use factagent::db::{CheckStore, SimilarCheck, WalCheckStore};
use factagent::models::FactCheckResult;
use factagent::pipeline::{ProgressObserver, RunHooks, Stage};
use factagent::review::ConsoleReviewer;
use factagent::{build_checker, CheckOutcome, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "factagent", version, about = "Fact-check a claim against web evidence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check one claim.
    Check {
        claim: String,
        /// Review every sub-verdict interactively before synthesis.
        #[arg(long)]
        review: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// List the most recent checks.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show store statistics.
    Stats,
}

struct StageLine;

impl ProgressObserver for StageLine {
    fn on_stage(&self, stage: &Stage) {
        eprintln!("-> {stage}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Check {
            claim,
            review,
            json,
            session,
        } => {
            let checker = build_checker(&config)?;
            let reviewer = ConsoleReviewer::new();
            let observer = StageLine;
            let mut hooks = RunHooks::default().with_observer(&observer);
            if review {
                hooks = hooks.with_reviewer(&reviewer);
            }
            let outcome = checker.check_with(&session, &claim, None, hooks).await;
            report(&outcome, json)?;
            if matches!(outcome, CheckOutcome::Failed { .. } | CheckOutcome::Rejected(_)) {
                std::process::exit(1);
            }
        }
        Command::Recent { limit } => {
            let store = WalCheckStore::open(&config.store_path)?;
            for check in store.recent(limit).await? {
                println!(
                    "{}  {:<15} {:>4.0}%  {}{}",
                    check.created_at,
                    check.result.overall_verdict,
                    check.result.confidence * 100.0,
                    check.claim,
                    if check.human_reviewed { "  (reviewed)" } else { "" }
                );
            }
        }
        Command::Stats => {
            let store = WalCheckStore::open(&config.store_path)?;
            let stats = store.stats().await?;
            println!("total checks:   {}", stats.total);
            println!("human reviewed: {}", stats.human_reviewed);
            for (verdict, count) in &stats.by_verdict {
                println!("  {verdict:<15} {count}");
            }
        }
    }
    Ok(())
}

fn report(outcome: &CheckOutcome, json: bool) -> anyhow::Result<()> {
    match outcome {
        CheckOutcome::Cached(check) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&check.result)?);
            } else {
                println!("Already checked on {}.", check.created_at);
                print_result(&check.result);
            }
        }
        CheckOutcome::Completed {
            result,
            similar,
            human_reviewed,
            duration,
        } => {
            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
                return Ok(());
            }
            print_similar(similar);
            print_result(result);
            println!();
            println!(
                "checked in {:.1}s{}",
                duration.as_secs_f64(),
                if *human_reviewed { ", human reviewed" } else { "" }
            );
        }
        CheckOutcome::Failed { error, similar } => {
            if !json {
                print_similar(similar);
            }
            eprintln!("Fact check failed: {error}");
        }
        CheckOutcome::Rejected(rejection) => eprintln!("{rejection}"),
    }
    Ok(())
}

fn print_similar(similar: &[SimilarCheck]) {
    if similar.is_empty() {
        return;
    }
    println!("Similar claims checked before:");
    for s in similar {
        println!(
            "  {:.0}%  {}  -> {}",
            s.score * 100.0,
            s.check.claim,
            s.check.result.overall_verdict
        );
    }
    println!();
}

fn print_result(result: &FactCheckResult) {
    println!("Claim:      {}", result.original_claim);
    println!(
        "Verdict:    {} ({:.0}% confidence)",
        result.overall_verdict,
        result.confidence * 100.0
    );
    println!();
    println!("{}", result.summary);
    println!();
    for (i, sub) in result.sub_verdicts.iter().enumerate() {
        println!(
            "{}. {} -> {} ({:.0}%)",
            i + 1,
            sub.claim,
            sub.verdict,
            sub.confidence * 100.0
        );
        println!("   {}", sub.reasoning);
    }
    if !result.key_sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &result.key_sources {
            println!("  - {} <{}>", source.title, source.url);
        }
    }
}
