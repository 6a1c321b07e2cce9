use thiserror::Error;

/// A record that deserialized but broke one of its constraints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid field `{field}`: {reason}")]
pub struct ShapeViolation {
    pub field: String,
    pub reason: String,
}

impl ShapeViolation {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn nested(self, parent: &str) -> Self {
        Self {
            field: format!("{parent}.{}", self.field),
            reason: self.reason,
        }
    }
}

#[derive(Error, Debug)]
pub enum FailureCause {
    #[error("reasoning engine error: {0}")]
    Engine(String),
    #[error("unparsable output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Shape(#[from] ShapeViolation),
}

impl FailureCause {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureCause::Engine(_))
    }
}

/// A structured call that produced no valid record within its attempt budget.
#[derive(Error, Debug)]
#[error("structured output failed after {attempts} attempt(s): {cause}")]
pub struct CoercionFailure {
    pub attempts: usize,
    /// The last raw buffer received from the reasoning engine.
    pub raw: String,
    pub cause: FailureCause,
}

#[derive(Error, Debug)]
pub enum FactCheckError {
    #[error("decomposition failed: {0}")]
    DecompositionFailure(String),
    #[error("evaluation of {claim:?} failed: {reason}")]
    EvaluationGap { claim: String, reason: String },
    #[error("no sub-claim could be evaluated")]
    EmptyEvaluation,
    #[error("synthesis failed: {0}")]
    SynthesisFailure(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
    #[error("session limit of {limit} checks reached; start a new session to check more claims")]
    SessionLimit { limit: u32 },
    #[error("please wait {wait_secs} more seconds before the next check")]
    Cooldown { wait_secs: u64 },
    #[error("claim is too long ({len} characters, maximum {max})")]
    ClaimTooLong { len: usize, max: usize },
    #[error("claim is too short; please write a complete sentence")]
    ClaimTooShort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_violation_prefixes_the_path() {
        let v = ShapeViolation::new("confidence", "bad").nested("sub_verdicts[2]");
        assert_eq!(v.field, "sub_verdicts[2].confidence");
        assert_eq!(v.to_string(), "invalid field `sub_verdicts[2].confidence`: bad");
    }

    #[test]
    fn engine_errors_are_not_retryable() {
        assert!(!FailureCause::Engine("down".into()).is_retryable());
        assert!(FailureCause::Shape(ShapeViolation::new("a", "b")).is_retryable());
    }
}
