//! Remote tool layer: session manager, server processes and the JSON-RPC
//! client, all running on one background runtime thread.

pub mod client;
pub mod error;
pub mod manager;
pub mod process;
pub mod protocol;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ToolServerClient;
pub use error::{CallError, StartupError};
pub use manager::SessionManager;
pub use process::ServerProcess;
pub use runtime::{RuntimeError, RuntimeHandle, SessionRuntime};
