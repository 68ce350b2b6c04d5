//! Model backend that shells out to a configured command.
//!
//! The conversation is rendered to the child's stdin; the child's stdout is
//! the reply. This adapts any CLI-shaped model frontend (a vendor CLI, a
//! local inference wrapper, a test script) without binding to one HTTP API.

use async_trait::async_trait;
use planwire_application::ports::{ModelClient, ModelError};
use planwire_domain::prompt::{Message, Role};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// [`ModelClient`] backed by a child process per request.
pub struct CommandModelClient {
    command: String,
    args: Vec<String>,
}

impl CommandModelClient {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl ModelClient for CommandModelClient {
    async fn generate(&self, messages: &[Message]) -> Result<String, ModelError> {
        let prompt = render_prompt(messages);
        debug!(command = %self.command, bytes = prompt.len(), "invoking model command");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ModelError::Transport(format!("spawn {:?}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ModelError::Transport(e.to_string()))?;
            // Close stdin so the child sees EOF and answers.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModelError::Transport(format!(
                "model command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Flatten the conversation into a role-annotated transcript.
fn render_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let header = match message.role {
            Role::System => "### System",
            Role::User => "### User",
            Role::Assistant => "### Assistant",
        };
        prompt.push_str(header);
        prompt.push('\n');
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str("### Assistant\n");
    prompt
}
