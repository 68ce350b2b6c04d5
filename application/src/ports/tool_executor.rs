//! Tool executor port
//!
//! Defines how the application layer dispatches tool calls. The
//! infrastructure adapter routes between in-process handlers and remote
//! tool servers.

use async_trait::async_trait;
use planwire_domain::tool::{ToolCall, ToolRegistry, ToolResult};

/// A dispatch that never reached a tool.
///
/// A tool that ran and reported failure is a [`ToolResult`] with
/// `success == false`, not an `ExecutionError`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    /// The name resolves to nothing, local or remote. Detected without any
    /// network hop.
    #[error("unknown tool {0:?}")]
    UnknownTool(String),
    /// Delegating to a remote server failed at the transport level.
    #[error("call to {tool:?} on server {server:?} failed: {reason}")]
    CallFailed {
        tool: String,
        server: String,
        reason: String,
    },
}

/// Port for tool execution.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// The registry backing this executor.
    fn registry(&self) -> &ToolRegistry;

    /// Check if a tool is available.
    fn has_tool(&self, name: &str) -> bool {
        self.registry().contains(name)
    }

    /// Execute one tool call.
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ExecutionError>;
}
