//! Run records — the audit trail of a planning run.

use crate::command::Command;
use crate::tool::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One Planning → Parsing → Dispatching pass, recorded verbatim.
///
/// Every iteration lands in the trail, including the failed ones: a parse
/// failure has `parse_error` set and no `command`, an unknown-tool dispatch
/// has `execution_error` set and no `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanIteration {
    /// Zero-based iteration index within the run.
    pub index: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Conversation message the model was answering: the task on the first
    /// iteration, the preceding feedback afterwards.
    pub prompt: String,
    /// Raw model reply, before parsing.
    pub model_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
}

impl PlanIteration {
    pub fn new(
        index: usize,
        started_at: DateTime<Utc>,
        prompt: impl Into<String>,
        model_output: impl Into<String>,
    ) -> Self {
        Self {
            index,
            started_at,
            duration_ms: 0,
            prompt: prompt.into(),
            model_output: model_output.into(),
            command: None,
            parse_error: None,
            result: None,
            execution_error: None,
        }
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_parse_error(mut self, error: impl Into<String>) -> Self {
        self.parse_error = Some(error.into());
        self
    }

    pub fn with_result(mut self, result: ToolResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_execution_error(mut self, error: impl Into<String>) -> Self {
        self.execution_error = Some(error.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The model delivered a final answer.
    Completed { answer: String },
    /// The model emitted `ERROR(...)`, declaring it cannot proceed.
    ModelDeclaredFailure { message: String },
    /// Too many consecutive replies failed to parse.
    ProtocolViolation { last_error: String },
    /// The model backend stayed unreachable through every retry.
    ModelUnavailable { reason: String },
    /// The iteration cap fired before the model finished.
    MaxIterationsExceeded,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { .. } => write!(f, "completed"),
            Self::ModelDeclaredFailure { message } => {
                write!(f, "model declared failure: {message}")
            }
            Self::ProtocolViolation { last_error } => {
                write!(f, "protocol violation: {last_error}")
            }
            Self::ModelUnavailable { reason } => write!(f, "model unavailable: {reason}"),
            Self::MaxIterationsExceeded => write!(f, "max iterations exceeded"),
        }
    }
}

/// The single value a run produces: its outcome plus the full trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub iterations: Vec<PlanIteration>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// The final answer, when the run completed.
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Completed { answer } => Some(answer),
            _ => None,
        }
    }
}
