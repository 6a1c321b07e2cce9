use crate::error::{CoercionFailure, FailureCause};
use crate::models::Validate;
use crate::pipeline::repair::{extract_candidate, repair};
use crate::pipeline::traits::{EngineRequest, ProgressObserver, ReasoningEngine};
use futures_util::StreamExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Drives structured calls: prompt with a schema, stream, extract, repair,
/// validate, and re-prompt on rejection.
pub struct SchemaCoercionEngine<E> {
    engine: E,
    max_retries: usize,
    max_tokens: u32,
}

impl<E: ReasoningEngine> SchemaCoercionEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            max_retries: DEFAULT_MAX_RETRIES,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub async fn coerce<T>(
        &self,
        role: &str,
        task: &str,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<T, CoercionFailure>
    where
        T: DeserializeOwned + JsonSchema + Validate,
    {
        let shape = shape_of::<T>();
        let role_instruction = with_output_format(role, &shape);
        let total_attempts = self.max_retries + 1;
        let mut task_instruction = task.to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = EngineRequest {
                role_instruction: role_instruction.clone(),
                task_instruction: task_instruction.clone(),
                shape: shape.clone(),
                max_tokens: self.max_tokens,
            };

            let raw = match self.collect(&request, observer).await {
                Ok(raw) => raw,
                Err(broken) => {
                    return Err(CoercionFailure {
                        attempts: attempt,
                        raw: broken.partial,
                        cause: FailureCause::Engine(format!("{:#}", broken.error)),
                    })
                }
            };

            match decode::<T>(&raw, &shape) {
                Ok(record) => {
                    debug!(attempt, chars = raw.len(), "structured output accepted");
                    return Ok(record);
                }
                Err(cause) if cause.is_retryable() && attempt < total_attempts => {
                    warn!(attempt, total_attempts, %cause, "structured output rejected, re-prompting");
                    task_instruction = insist_on_json(task, &cause);
                }
                Err(cause) => {
                    return Err(CoercionFailure {
                        attempts: attempt,
                        raw,
                        cause,
                    })
                }
            }
        }
    }

    async fn collect(
        &self,
        request: &EngineRequest,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<String, BrokenStream> {
        let mut buffer = String::new();
        let mut tokens = match self.engine.stream(request).await {
            Ok(tokens) => tokens,
            Err(error) => return Err(BrokenStream::new(buffer, error)),
        };
        while let Some(token) = tokens.next().await {
            let token = match token {
                Ok(token) => token,
                Err(error) => return Err(BrokenStream::new(buffer, error)),
            };
            if let Some(observer) = observer {
                observer.on_token(&token);
            }
            buffer.push_str(&token);
        }
        Ok(buffer)
    }
}

/// A stream that failed, with whatever arrived before the failure.
struct BrokenStream {
    partial: String,
    error: anyhow::Error,
}

impl BrokenStream {
    fn new(partial: String, error: anyhow::Error) -> Self {
        Self { partial, error }
    }
}

/// Turns one raw reply into a validated record of the given shape.
pub fn decode<T>(raw: &str, shape: &Value) -> Result<T, FailureCause>
where
    T: DeserializeOwned + Validate,
{
    let opening = if shape["type"] == "array" { '[' } else { '{' };
    let candidate = extract_candidate(raw, opening);
    let value: Value = match serde_json::from_str(&candidate) {
        Ok(value) => value,
        Err(first) => {
            debug!(error = %first, "direct parse failed, repairing");
            serde_json::from_str(&repair(&candidate))?
        }
    };
    let record: T = serde_json::from_value(value)?;
    record.validate()?;
    Ok(record)
}

pub fn shape_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

fn with_output_format(role: &str, shape: &Value) -> String {
    let schema = serde_json::to_string_pretty(shape).unwrap_or_default();
    format!(
        "{role}\n\n## Output format (JSON Schema)\n```json\n{schema}\n```\n\n\
Reply with one JSON object that matches this schema. Inside text values, escape every \
quotation mark as \\\" and never put a raw line break inside a string."
    )
}

fn insist_on_json(task: &str, cause: &FailureCause) -> String {
    format!(
        "{task}\n\nIMPORTANT: your previous reply was rejected ({cause}). Reply with JSON only: \
no prose, no code fences. Escape every quotation mark inside text values as \\\"."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClaimDecomposition, SubClaimVerdict, Verdict};
    use crate::pipeline::mock::{RecordingObserver, ScriptedEngine};

    const VERDICT: &str = r#"{"claim": "c", "verdict": "true", "confidence": 0.9, "evidence": [], "reasoning": "ok"}"#;

    #[tokio::test]
    async fn accepts_fenced_reply_on_first_attempt() {
        let engine = ScriptedEngine::new([format!("```json\n{VERDICT}\n```")]);
        let coercion = SchemaCoercionEngine::new(engine);
        let verdict: SubClaimVerdict = coercion.coerce("role", "task", None).await.unwrap();
        assert_eq!(verdict.verdict, Verdict::True);
        assert_eq!(coercion.engine().calls(), 1);
    }

    #[tokio::test]
    async fn role_carries_schema_and_escape_directive() {
        let engine = ScriptedEngine::new([VERDICT]);
        let coercion = SchemaCoercionEngine::new(engine).with_max_tokens(512);
        let _: SubClaimVerdict = coercion.coerce("You judge.", "task", None).await.unwrap();
        let request = &coercion.engine().requests()[0];
        assert!(request.role_instruction.starts_with("You judge."));
        assert!(request.role_instruction.contains("\"reasoning\""));
        assert!(request.role_instruction.contains("escape every quotation mark"));
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.shape["title"], "SubClaimVerdict");
    }

    #[tokio::test]
    async fn repairs_malformed_reply_without_retry() {
        let engine = ScriptedEngine::new([
            r#"{"claim": "c", "verdict": "false", "confidence": 0.7, "evidence": [], "reasoning": "he said "no" twice",}"#,
        ]);
        let coercion = SchemaCoercionEngine::new(engine);
        let verdict: SubClaimVerdict = coercion.coerce("role", "task", None).await.unwrap();
        assert_eq!(verdict.reasoning, "he said \"no\" twice");
        assert_eq!(coercion.engine().calls(), 1);
    }

    #[tokio::test]
    async fn shape_violation_triggers_insistent_retry() {
        let out_of_range = r#"{"claim": "c", "verdict": "true", "confidence": 4.0, "evidence": [], "reasoning": "r"}"#;
        let engine = ScriptedEngine::new([out_of_range, VERDICT]);
        let coercion = SchemaCoercionEngine::new(engine);
        let verdict: SubClaimVerdict = coercion.coerce("role", "judge it", None).await.unwrap();
        assert_eq!(verdict.confidence, 0.9);

        let requests = coercion.engine().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].task_instruction, "judge it");
        assert!(requests[1].task_instruction.starts_with("judge it"));
        assert!(requests[1].task_instruction.contains("JSON only"));
        assert!(requests[1].task_instruction.contains("confidence"));
    }

    #[tokio::test]
    async fn exhausted_budget_reports_last_buffer() {
        let engine = ScriptedEngine::new(["nope", "still nope", "{\"sub_claims\": []}"]);
        let coercion = SchemaCoercionEngine::new(engine);
        let failure = coercion
            .coerce::<ClaimDecomposition>("role", "task", None)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.raw, "{\"sub_claims\": []}");
        assert!(matches!(failure.cause, FailureCause::Parse(_)));
        assert_eq!(coercion.engine().remaining(), 0);
    }

    #[tokio::test]
    async fn retry_budget_is_configurable() {
        let engine = ScriptedEngine::new(["x", VERDICT]);
        let coercion = SchemaCoercionEngine::new(engine).with_max_retries(0);
        let failure = coercion
            .coerce::<SubClaimVerdict>("role", "task", None)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(coercion.engine().calls(), 1);
    }

    #[tokio::test]
    async fn engine_failure_is_not_retried() {
        let engine = ScriptedEngine::new(Vec::<String>::new());
        engine.push_error("connection reset");
        engine.push_reply(VERDICT);
        let coercion = SchemaCoercionEngine::new(engine);
        let failure = coercion
            .coerce::<SubClaimVerdict>("role", "task", None)
            .await
            .unwrap_err();
        assert!(matches!(failure.cause, FailureCause::Engine(ref m) if m.contains("connection reset")));
        assert_eq!(coercion.engine().remaining(), 1);
    }

    #[tokio::test]
    async fn citation_in_leading_prose_does_not_derail_extraction() {
        let engine = ScriptedEngine::new([format!("According to [1] and [2]: {VERDICT}")]);
        let coercion = SchemaCoercionEngine::new(engine);
        let verdict: SubClaimVerdict = coercion.coerce("role", "task", None).await.unwrap();
        assert_eq!(verdict.reasoning, "ok");
        assert_eq!(coercion.engine().calls(), 1);
    }

    #[tokio::test]
    async fn broken_stream_keeps_partial_buffer() {
        let engine = ScriptedEngine::new(Vec::<String>::new());
        engine.push_broken(r#"{"claim": "c", "verdict""#, "stream reset");
        let coercion = SchemaCoercionEngine::new(engine);
        let failure = coercion
            .coerce::<SubClaimVerdict>("role", "task", None)
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.raw, r#"{"claim": "c", "verdict""#);
        assert!(matches!(failure.cause, FailureCause::Engine(ref m) if m.contains("stream reset")));
    }

    #[tokio::test]
    async fn observer_sees_every_token() {
        let engine = ScriptedEngine::new([VERDICT]);
        let coercion = SchemaCoercionEngine::new(engine);
        let observer = RecordingObserver::default();
        let _: SubClaimVerdict = coercion.coerce("role", "task", Some(&observer)).await.unwrap();
        let tokens = observer.tokens();
        assert!(tokens.len() > 1);
        assert_eq!(tokens.concat(), VERDICT);
    }
}
