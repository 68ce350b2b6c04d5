//! Tool execution adapters: local built-ins and the execution router.

pub mod builtin;
pub mod executor;

pub use builtin::{FinalAnswerTool, LocalTool, PingTool};
pub use executor::{ExecutionRouter, format_catalog};
