//! Ports — interfaces the application layer depends on.
//!
//! Inbound work arrives through use cases; these traits are the outbound
//! seams that infrastructure and presentation adapters implement.

pub mod model_client;
pub mod run_observer;
pub mod tool_executor;

pub use model_client::{ModelClient, ModelError};
pub use run_observer::{CompositeRunObserver, NoRunObserver, RunObserver};
pub use tool_executor::{ExecutionError, ToolExecutorPort};
