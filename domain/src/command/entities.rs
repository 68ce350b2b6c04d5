//! Command entities — the closed set of instructions a model may emit.

use serde::{Deserialize, Serialize};

/// Argument object attached to a command: an ordered map of names to
/// JSON values (strings, numbers, booleans, null, nested objects, arrays).
pub type Args = serde_json::Map<String, serde_json::Value>;

/// A single instruction emitted by the planning model.
///
/// The set is closed: anything that is not one of these three forms is a
/// protocol violation, never a fallthrough.
///
/// `Query` and `Task` are routed identically; the distinction records the
/// model's declared intent (read-only lookup vs. side-effecting action) and
/// is preserved in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Read-only tool invocation.
    Query { tool: String, args: Args },
    /// Side-effecting tool invocation.
    Task { tool: String, args: Args },
    /// The model declares it cannot proceed.
    Error { message: String },
}

impl Command {
    /// Create a `Query` with no arguments.
    pub fn query(tool: impl Into<String>) -> Self {
        Self::Query {
            tool: tool.into(),
            args: Args::new(),
        }
    }

    /// Create a `Task` with no arguments.
    pub fn task(tool: impl Into<String>) -> Self {
        Self::Task {
            tool: tool.into(),
            args: Args::new(),
        }
    }

    /// Create an `Error` declaration.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Add an argument (builder style). No-op on `Error`.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        if let Self::Query { args, .. } | Self::Task { args, .. } = &mut self {
            args.insert(name.into(), value.into());
        }
        self
    }

    /// The target tool name, if this command invokes one.
    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::Query { tool, .. } | Self::Task { tool, .. } => Some(tool),
            Self::Error { .. } => None,
        }
    }

    /// The argument object, if this command invokes a tool.
    pub fn args(&self) -> Option<&Args> {
        match self {
            Self::Query { args, .. } | Self::Task { args, .. } => Some(args),
            Self::Error { .. } => None,
        }
    }

    /// Wire-level keyword for this command.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Query { .. } => "QUERY",
            Self::Task { .. } => "TASK",
            Self::Error { .. } => "ERROR",
        }
    }
}
