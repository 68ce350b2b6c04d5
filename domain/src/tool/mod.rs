//! Tool system — descriptors, calls, results and the registry.

pub mod entities;
pub mod registry;
pub mod value_objects;

pub use entities::{FINAL_ANSWER_TOOL, ToolCall, ToolDescriptor, ToolOwner};
pub use registry::ToolRegistry;
pub use value_objects::{ToolError, ToolResult};
