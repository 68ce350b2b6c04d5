//! Configuration file schema.
//!
//! ```toml
//! [model]
//! command = "llm"
//! args = ["-m", "gpt-4o-mini"]
//!
//! [run]
//! max_iterations = 10
//!
//! [[servers]]
//! name = "tracker"
//! address = "127.0.0.1:7401"
//! command = "tracker-server"
//! persistent = true
//! ```

use planwire_application::use_cases::RunConfig;
use planwire_domain::server::ServerDescriptor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration merged from all sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub log: LogSection,
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
}

/// `[model]` — the command-backed model client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    /// Executable invoked per model request.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// `[run]` — orchestration-loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    pub max_iterations: usize,
    pub max_parse_failures: usize,
    pub max_model_retries: usize,
    pub model_timeout_secs: u64,
    pub history_window: usize,
}

impl Default for RunSection {
    fn default() -> Self {
        let defaults = RunConfig::default();
        Self {
            max_iterations: defaults.max_iterations,
            max_parse_failures: defaults.max_parse_failures,
            max_model_retries: defaults.max_model_retries,
            model_timeout_secs: defaults.model_timeout.as_secs(),
            history_window: defaults.history_window,
        }
    }
}

impl RunSection {
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            max_iterations: self.max_iterations,
            max_parse_failures: self.max_parse_failures,
            max_model_retries: self.max_model_retries,
            model_timeout: Duration::from_secs(self.model_timeout_secs),
            history_window: self.history_window,
        }
    }
}

/// `[session]` — remote session timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Bound on each I/O step of a remote tool call, in seconds.
    pub call_timeout_secs: u64,
    /// SIGTERM grace before SIGKILL at shutdown, in seconds.
    pub stop_grace_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            call_timeout_secs: 30,
            stop_grace_secs: 3,
        }
    }
}

impl SessionSection {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// `[log]` — durable run output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSection {
    /// Append the JSONL audit trail of each run to this file.
    pub run_log: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FileConfig::default();
        assert_eq!(config.run.max_iterations, 10);
        assert_eq!(config.run.max_parse_failures, 3);
        assert_eq!(config.session.call_timeout_secs, 30);
        assert!(config.servers.is_empty());
        assert!(config.model.command.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [model]
            command = "llm"
            args = ["-m", "small"]

            [run]
            max_iterations = 5
            max_parse_failures = 3
            max_model_retries = 1
            model_timeout_secs = 30
            history_window = 20

            [[servers]]
            name = "tracker"
            address = "127.0.0.1:7401"
            command = "tracker-server"
            args = ["--port", "7401"]
            persistent = true

            [[servers]]
            name = "wiki"
            address = "127.0.0.1:7402"
        "#;
        let config: FileConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.model.command.as_deref(), Some("llm"));
        assert_eq!(config.run.max_iterations, 5);
        assert_eq!(config.servers.len(), 2);
        assert!(config.servers[0].persistent);
        assert!(config.servers[1].command.is_none());
        assert_eq!(
            config.run.to_run_config().model_timeout,
            Duration::from_secs(30)
        );
    }
}
