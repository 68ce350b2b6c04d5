//! Model backend adapters.

pub mod command_client;

pub use command_client::CommandModelClient;
