//! Batch Scheduler error taxonomy.

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("no active execution")]
    NoActiveExecution,

    #[error("batch index {0} out of range")]
    BatchIndexOutOfRange(usize),

    #[error("plan has no batches, nothing to execute")]
    EmptyPlan,

    #[error("execution already running")]
    AlreadyRunning,

    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    WaterLevel(#[from] crate::waterlevel::WaterLevelError),

    #[error(transparent)]
    Regeneration(#[from] crate::regen::RegenerationError),
}
