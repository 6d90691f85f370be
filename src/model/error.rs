//! Farm Model error taxonomy.

use super::ids::GateId;

#[derive(Debug, thiserror::Error)]
pub enum FarmModelError {
    #[error("malformed gate id: {0}")]
    MalformedGateId(String),

    #[error("gate {0} references unknown segment")]
    UnknownSegment(GateId),

    #[error("field {0} references unknown inlet gate")]
    UnknownInletGate(String),
}
