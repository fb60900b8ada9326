use std::fmt;

use thiserror::Error;

use crate::llm_client::LlmError;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Phase {
    ExtractSkills,
    MergeSkills,
    TailorSummary,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ExtractSkills => "skill extraction",
            Phase::MergeSkills => "skills merge",
            Phase::TailorSummary => "summary tailoring",
        };
        f.write_str(name)
    }
}

/// Error taxonomy for the tailoring pipeline.
///
/// `LlmTimeout` and `MalformedResponse` are recoverable when a previously
/// persisted artifact exists (the phase degrades rather than failing).
/// Everything else is fatal for the phase that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("LLM endpoint unreachable: {0}")]
    LlmUnavailable(String),

    #[error("LLM call produced no response within {0} seconds")]
    LlmTimeout(u64),

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("summary markers not found in resume source")]
    MarkerNotFound,

    #[error("resume structure error: {0}")]
    ResumeStructure(String),

    #[error("missing input artifact: {0}")]
    MissingArtifact(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unreachable(msg) => PipelineError::LlmUnavailable(msg),
            LlmError::Timeout(secs) => PipelineError::LlmTimeout(secs),
            LlmError::Api { status, message } => {
                PipelineError::LlmUnavailable(format!("API error (status {status}): {message}"))
            }
            LlmError::EmptyContent => {
                PipelineError::MalformedResponse("response carried no content".to_string())
            }
        }
    }
}

impl PipelineError {
    /// True for failures the extractor/tailorer may absorb by falling back
    /// to a previous artifact (or the unchanged summary).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::LlmTimeout(_) | PipelineError::MalformedResponse(_)
        )
    }
}

/// A fatal failure, carrying the phase it occurred in.
/// The coordinator halts on the first of these and surfaces it verbatim.
#[derive(Debug, Error)]
#[error("pipeline failed during {phase}: {error}")]
pub struct PipelineFailure {
    pub phase: Phase,
    #[source]
    pub error: PipelineError,
}
