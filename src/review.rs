use crate::models::{SubClaimVerdict, Verdict};
use crate::pipeline::{HumanReviewer, ReviewDecision};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Interactive review on stdin/stdout.
pub struct ConsoleReviewer {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleReviewer {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(stdin()).lines()),
        }
    }

    async fn read_line(&self) -> Result<String> {
        let mut lines = self.lines.lock().await;
        lines
            .next_line()
            .await?
            .ok_or_else(|| anyhow!("stdin closed during review"))
    }
}

impl Default for ConsoleReviewer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanReviewer for ConsoleReviewer {
    async fn review(
        &self,
        index: usize,
        total: usize,
        verdict: &SubClaimVerdict,
    ) -> Result<ReviewDecision> {
        println!();
        println!("[{}/{}] {}", index + 1, total, verdict.claim);
        println!(
            "  verdict: {} (confidence {:.0}%)",
            verdict.verdict,
            verdict.confidence * 100.0
        );
        println!("  reasoning: {}", verdict.reasoning);
        loop {
            println!("  enter to accept, or `<verdict> [comment]` to correct:");
            let line = self.read_line().await?;
            match parse_review_input(&line) {
                Ok(decision) => return Ok(decision),
                Err(e) => println!("  {e}"),
            }
        }
    }

    async fn general_comment(&self) -> Result<Option<String>> {
        println!("General comment (enter to skip):");
        let line = self.read_line().await?;
        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

/// Empty input accepts; otherwise the first word is a verdict and the rest a comment.
pub fn parse_review_input(line: &str) -> Result<ReviewDecision> {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("ok") || line.eq_ignore_ascii_case("y") {
        return Ok(ReviewDecision::Accept);
    }
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let Some(verdict) = Verdict::parse(head) else {
        bail!("unknown verdict {head:?}; use true, false, partially_true, misleading or unverifiable");
    };
    let comment = rest.trim();
    Ok(ReviewDecision::Correct {
        verdict: Some(verdict),
        comment: (!comment.is_empty()).then(|| comment.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_accepts() {
        assert_eq!(parse_review_input("  ").unwrap(), ReviewDecision::Accept);
        assert_eq!(parse_review_input("OK").unwrap(), ReviewDecision::Accept);
    }

    #[test]
    fn verdict_with_comment() {
        assert_eq!(
            parse_review_input("false  figures are from 2019").unwrap(),
            ReviewDecision::Correct {
                verdict: Some(Verdict::False),
                comment: Some("figures are from 2019".to_string()),
            }
        );
        assert_eq!(
            parse_review_input("misleading").unwrap(),
            ReviewDecision::Correct {
                verdict: Some(Verdict::Misleading),
                comment: None,
            }
        );
    }

    #[test]
    fn unknown_verdict_is_rejected() {
        assert!(parse_review_input("maybe so").is_err());
    }
}
