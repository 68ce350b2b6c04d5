//! Use cases — the operations the application exposes.

pub mod run_plan;

pub use run_plan::{RunConfig, RunPlanUseCase};
