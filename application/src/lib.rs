//! Application layer for planwire
//!
//! Defines the outbound ports ([`ports`]) and the orchestration-loop use
//! case ([`use_cases::run_plan`]). Adapters for the ports live in the
//! infrastructure layer; this crate depends only on the domain.

pub mod ports;
pub mod use_cases;

pub use ports::{
    CompositeRunObserver, ExecutionError, ModelClient, ModelError, NoRunObserver, RunObserver,
    ToolExecutorPort,
};
pub use use_cases::{RunConfig, RunPlanUseCase};
