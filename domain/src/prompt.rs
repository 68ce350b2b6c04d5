//! Prompt assembly — the system prompt and in-loop feedback messages.

use crate::command::ParseError;
use crate::tool::{FINAL_ANSWER_TOOL, ToolDescriptor, ToolResult};
use serde::{Deserialize, Serialize};

/// Who produced a message in the model conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of the model conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Renders the system prompt and the feedback messages the loop sends back
/// to the model between iterations.
pub struct PromptTemplate;

impl PromptTemplate {
    /// Full system prompt: protocol rules, the tool catalog and worked
    /// examples. `catalog` should come from
    /// [`ToolRegistry::catalog`](crate::tool::ToolRegistry::catalog) so the
    /// listing is sorted and stable.
    pub fn system(catalog: &[&ToolDescriptor]) -> String {
        let mut prompt = String::from(
            "You are a planning engine that accomplishes tasks by calling tools.\n\
             \n\
             Reply with exactly one command block per message:\n\
             \n\
             BEGIN\n\
             <COMMAND>\n\
             END\n\
             \n\
             where <COMMAND> is one of:\n\
             - QUERY(tool_name, {\"arg\": \"value\"}) for read-only lookups\n\
             - TASK(tool_name, {\"arg\": \"value\"}) for actions with side effects\n\
             - ERROR(\"reason\") when no available tool can make progress\n\
             \n\
             Arguments are a JSON object. Emit exactly one command per block\n\
             and nothing after END. Each tool result will be sent back to you\n\
             in the next message.\n",
        );

        prompt.push_str("\nYour available tools are:\n");
        for tool in catalog {
            prompt.push_str(&format!("- `{}`: {}\n", tool.name, tool.description));
        }

        prompt.push_str(&format!(
            "\nWhen the task is done, deliver the result with the `{FINAL_ANSWER_TOOL}` tool:\n\
             \n\
             BEGIN\n\
             QUERY({FINAL_ANSWER_TOOL}, {{\"text\": \"<your final answer>\"}})\n\
             END\n\
             \n\
             Example of a tool lookup:\n\
             \n\
             BEGIN\n\
             QUERY(get_issue, {{\"id\": \"PROJ-1\"}})\n\
             END\n",
        ));

        prompt
    }

    /// Feedback sent after a reply failed to parse.
    pub fn parse_error_feedback(error: &ParseError) -> String {
        format!(
            "Your previous reply was not a valid command block: {error}. \
             Reply again with exactly one BEGIN/END block."
        )
    }

    /// Feedback carrying a tool result back into the conversation.
    pub fn tool_result_feedback(result: &ToolResult) -> String {
        if result.success {
            format!(
                "Result of `{}`:\n{}",
                result.tool_name,
                result.output().unwrap_or("")
            )
        } else {
            let error = result
                .error()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown error".to_string());
            format!("Tool `{}` failed: {}", result.tool_name, error)
        }
    }

    /// Feedback after a dispatch-level failure (unknown tool, transport
    /// error). Lists the catalog again so the model can self-correct.
    pub fn execution_error_feedback(error: &str, catalog: &[&ToolDescriptor]) -> String {
        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        format!(
            "Command could not be executed: {error}. Available tools: {}.",
            names.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolError, ToolRegistry};

    fn sample_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::local("ping", "liveness probe"));
        registry.register(ToolDescriptor::remote("get_issue", "fetch an issue", "tracker"));
        registry
    }

    #[test]
    fn test_system_prompt_lists_tools_in_order() {
        let registry = sample_registry();
        let prompt = PromptTemplate::system(&registry.catalog());
        let get_issue = prompt.find("- `get_issue`: fetch an issue").unwrap();
        let ping = prompt.find("- `ping`: liveness probe").unwrap();
        assert!(get_issue < ping);
        assert!(prompt.contains("BEGIN"));
        assert!(prompt.contains(FINAL_ANSWER_TOOL));
    }

    #[test]
    fn test_parse_error_feedback_names_the_rule() {
        let feedback = PromptTemplate::parse_error_feedback(&ParseError::MissingEnd);
        assert!(feedback.contains("matching END"));
    }

    #[test]
    fn test_tool_result_feedback() {
        let ok = PromptTemplate::tool_result_feedback(&ToolResult::success("ping", "pong"));
        assert!(ok.contains("pong"));

        let failed = PromptTemplate::tool_result_feedback(&ToolResult::failure(
            "get_issue",
            ToolError::timeout("tools/call"),
        ));
        assert!(failed.contains("TIMEOUT"));
    }
}
