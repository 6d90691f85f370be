//! Plan Builder and Multi-Scenario Builder — the planning algorithms.

pub mod builder;
pub mod error;
pub mod scenario;
pub mod types;

pub use builder::{build_plan, ReadingResolutionMode};
pub use error::PlanBuildError;
pub use scenario::{build_scenarios, Scenario, ScenarioComparison};
pub use types::{
    Batch, BatchStats, Command, CommandAction, CommandTarget, Plan, PlanCalc, PlanTotals, Step,
    StepSequence,
};
