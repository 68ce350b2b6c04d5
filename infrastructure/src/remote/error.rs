//! Error types for the remote session layer.

use planwire_domain::server::ServerConfigError;
use std::time::Duration;

/// Why the session manager failed to start.
///
/// Startup is all-or-nothing with respect to processes and the runtime:
/// whichever variant comes back, no child process is left running.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid server configuration: {0}")]
    Config(#[from] ServerConfigError),
    #[error("failed to spawn server {name:?}: {reason}")]
    Spawn { name: String, reason: String },
    #[error("background session runtime failed to start: {0}")]
    Runtime(String),
    #[error("session manager is already running")]
    AlreadyRunning,
}

/// Why a remote tool call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("no server named {0:?} is registered")]
    UnknownServer(String),
    #[error("I/O failure talking to server {server:?}: {reason}")]
    Io { server: String, reason: String },
    #[error("server {server:?} returned RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    /// The tool ran on the server and reported failure. The session stays
    /// healthy; this is the tool's answer, not a transport fault.
    #[error("tool reported failure: {0}")]
    ToolFailure(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response from server {server:?}: {reason}")]
    Protocol { server: String, reason: String },
    #[error("session manager is not running")]
    NotRunning,
}
