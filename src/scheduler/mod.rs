//! Batch Scheduler — the dynamic batch executor: state machine per
//! batch, wall-clock cooperative loop, prepare -> execute -> complete.

pub mod driver;
pub mod error;
pub mod state;

pub use driver::BatchScheduler;
pub use error::SchedulerError;
pub use state::{
    BatchExecution, BatchStatus, BatchStatusSnapshot, ExecutionState, ExecutionStatus,
    StatusSnapshot,
};
