//! Tool-server descriptors and their fail-fast validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration of one remote tool server.
///
/// `address` is the `host:port` the JSON-RPC client connects to. When
/// `command` is set, the session manager spawns that process at startup and
/// owns its lifetime; otherwise the server is expected to already be
/// listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Unique name, used for routing and log context.
    pub name: String,
    /// TCP address (`host:port`) the server listens on.
    pub address: String,
    /// Executable to spawn for this server, if the manager owns the process.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments for the spawned executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the spawned executable.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the spawned executable.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Keep one session open across calls instead of reconnecting per call.
    #[serde(default)]
    pub persistent: bool,
}

impl ServerDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            command: None,
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            persistent: false,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.command = Some(command.into());
        self.args = args;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Validate a full server list before anything is spawned.
    pub fn validate_all(servers: &[ServerDescriptor]) -> Result<(), ServerConfigError> {
        let mut seen = std::collections::HashSet::new();
        for (index, server) in servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                return Err(ServerConfigError::MissingName { index });
            }
            if server.address.trim().is_empty() {
                return Err(ServerConfigError::MissingAddress {
                    name: server.name.clone(),
                });
            }
            if !seen.insert(server.name.clone()) {
                return Err(ServerConfigError::DuplicateName {
                    name: server.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A server list that must not be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerConfigError {
    #[error("server #{index} has no name")]
    MissingName { index: usize },
    #[error("server {name:?} has no address")]
    MissingAddress { name: String },
    #[error("duplicate server name {name:?}")]
    DuplicateName { name: String },
}
