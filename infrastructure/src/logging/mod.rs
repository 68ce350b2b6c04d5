//! Durable logging adapters.

pub mod jsonl;

pub use jsonl::JsonlRunLogger;
