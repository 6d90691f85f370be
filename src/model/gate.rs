//! Gate — belongs to exactly one segment; only main/branch regulators are
//! treated as regulators by the Plan Builder.

use serde::{Deserialize, Serialize};

use super::ids::GateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    MainRegulator,
    BranchRegulator,
    FieldInlet,
    FieldDrain,
    Inout,
    PumpValve,
}

impl GateKind {
    /// Only main/branch regulators are regulators for plan-building purposes.
    pub fn is_regulator(self) -> bool {
        matches!(self, GateKind::MainRegulator | GateKind::BranchRegulator)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    #[serde(rename = "type")]
    pub kind: GateKind,
    pub q_max_m3ph: f64,
}
