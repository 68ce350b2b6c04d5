//! Domain layer for planwire
//!
//! Core types and pure logic: the command protocol codec, the tool registry,
//! server descriptors and the run audit records. This crate has no
//! dependencies on infrastructure or I/O concerns.
//!
//! # Core Concepts
//!
//! - **Command protocol**: models drive tools through strict BEGIN/END
//!   blocks containing exactly one `QUERY`, `TASK` or `ERROR` command.
//! - **Tool registry**: one flat namespace over local built-ins and
//!   remotely discovered tools, merged last-write-wins.
//! - **Run records**: every planning iteration is kept verbatim in the
//!   [`run::RunResult`] audit trail.

pub mod command;
pub mod prompt;
pub mod run;
pub mod server;
pub mod tool;

// Re-export commonly used types
pub use command::{Args, Command, ParseError, parse, render};
pub use prompt::{Message, PromptTemplate, Role};
pub use run::{PlanIteration, RunOutcome, RunResult};
pub use server::{ServerConfigError, ServerDescriptor};
pub use tool::{
    FINAL_ANSWER_TOOL, ToolCall, ToolDescriptor, ToolError, ToolOwner, ToolRegistry, ToolResult,
};
