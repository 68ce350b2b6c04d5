//! Tool entities — descriptors and calls.

use crate::command::Args;
use serde::{Deserialize, Serialize};

/// Reserved local tool the model invokes to deliver its final answer and
/// finish the run.
pub const FINAL_ANSWER_TOOL: &str = "final_answer";

/// Who executes a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "server", rename_all = "snake_case")]
pub enum ToolOwner {
    /// In-process handler, no network involved.
    Local,
    /// A remote tool server, addressed by its configured name.
    Server(String),
}

impl std::fmt::Display for ToolOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Server(name) => write!(f, "server:{name}"),
        }
    }
}

/// An invokable tool as seen by the registry and the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub owner: ToolOwner,
}

impl ToolDescriptor {
    pub fn local(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            owner: ToolOwner::Local,
        }
    }

    pub fn remote(
        name: impl Into<String>,
        description: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            owner: ToolOwner::Server(server.into()),
        }
    }
}

/// A concrete request to execute one tool.
///
/// Built from a parsed [`Command`](crate::command::Command); `QUERY` and
/// `TASK` both reduce to this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: Args,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Fetch a string argument.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(|v| v.as_str())
    }
}
