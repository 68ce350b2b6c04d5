//! Infrastructure layer for planwire
//!
//! Adapters behind the application ports: the remote session manager and
//! its JSON-RPC tool-server client, the execution router with local
//! built-ins, the command-backed model client, configuration loading and
//! the JSONL run logger.

pub mod config;
pub mod logging;
pub mod model;
pub mod remote;
pub mod tools;

pub use config::{ConfigLoader, FileConfig};
pub use logging::JsonlRunLogger;
pub use model::CommandModelClient;
pub use remote::{CallError, SessionManager, StartupError};
pub use tools::{ExecutionRouter, LocalTool};
