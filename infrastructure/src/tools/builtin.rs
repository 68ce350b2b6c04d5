//! In-process tools.

use planwire_domain::command::Args;
use planwire_domain::tool::{FINAL_ANSWER_TOOL, ToolDescriptor, ToolResult};

/// A tool executed inside this process, with no network involved.
pub trait LocalTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    fn invoke(&self, args: &Args) -> ToolResult;
}

/// Liveness probe. Always succeeds.
pub struct PingTool;

impl LocalTool for PingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::local("ping", "Liveness probe; replies with pong.")
    }

    fn invoke(&self, _args: &Args) -> ToolResult {
        let reply = serde_json::json!({"ok": true, "reply": "pong"});
        ToolResult::success("ping", reply.to_string())
    }
}

/// Terminal tool: the orchestration loop intercepts it to end the run, so
/// this handler only exists for direct dispatch and echoes the answer back.
pub struct FinalAnswerTool;

impl LocalTool for FinalAnswerTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::local(
            FINAL_ANSWER_TOOL,
            "Deliver the final answer in the `text` argument and end the run.",
        )
    }

    fn invoke(&self, args: &Args) -> ToolResult {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        ToolResult::success(FINAL_ANSWER_TOOL, text)
    }
}
