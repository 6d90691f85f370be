//! Paddy-field irrigation planning and dynamic batch execution.
//!
//! Three tightly coupled subsystems carry the hard engineering:
//!
//! - **Plan Builder** (`plan`) — turns a farm topology plus a water-level
//!   snapshot into a batched, time-scheduled irrigation plan.
//! - **Batch Scheduler** (`scheduler`) — executes a plan batch by batch,
//!   re-deriving each batch's commands from fresh readings before it fires
//!   and closing devices bottom-up as fields complete.
//! - **Water-Level Store/Source** (`waterlevel`) — ingests, qualifies,
//!   caches and trend-analyses field water-level readings for both.
//!
//! `model` holds the pure data types everything else operates on; `regen`,
//! `dispatch` and `monitor` are the scheduler's three collaborators;
//! `config` is the operator-tunable threshold layer; `api` and the
//! `farm-scheduler` binary are the ambient HTTP/CLI surface.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod model;
pub mod monitor;
pub mod plan;
pub mod regen;
pub mod scheduler;
pub mod waterlevel;

pub use model::{FarmConfig, Field, Gate, GateKind, Pump, Segment, SegmentKind};
pub use plan::{build_plan, build_scenarios, Plan, ReadingResolutionMode};
pub use scheduler::{BatchScheduler, ExecutionState, SchedulerError};
pub use waterlevel::{WaterLevelSource, WaterLevelStore};
