//! Plan Regenerator error taxonomy.

#[derive(Debug, thiserror::Error)]
pub enum RegenerationError {
    #[error("regenerated batch rejected: {0}")]
    AdjustmentRejected(String),

    #[error("batch index {0} out of range")]
    BatchIndexOutOfRange(usize),
}
