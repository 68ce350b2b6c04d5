//! Configuration loading and schema.

pub mod file_config;
pub mod loader;

pub use file_config::{FileConfig, LogSection, ModelSection, RunSection, SessionSection};
pub use loader::ConfigLoader;
