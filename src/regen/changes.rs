//! PlanChange records and the regeneration result envelope.

use serde::Serialize;

use crate::model::{FieldId, GateId};
use crate::plan::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeType {
    NoChange,
    DurationAdjusted,
    FlowRateAdjusted,
    TimingShifted,
    FieldAdded,
    FieldRemoved,
    BatchSplit,
    BatchMerged,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeImpact {
    Minimal,
    Moderate,
    Significant,
    Critical,
}

/// Derive impact from the relative magnitude of a change, as a ratio of
/// "how much changed" over "how much there was to begin with".
///
/// Thresholds: `<0.1` minimal, `<0.3` moderate, `<0.5` significant, else
/// critical.
pub fn assess_impact(change_ratio: f64) -> PlanChangeImpact {
    let ratio = change_ratio.abs();
    if ratio < 0.1 {
        PlanChangeImpact::Minimal
    } else if ratio < 0.3 {
        PlanChangeImpact::Moderate
    } else if ratio < 0.5 {
        PlanChangeImpact::Significant
    } else {
        PlanChangeImpact::Critical
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanChange {
    pub change_type: PlanChangeType,
    pub impact: PlanChangeImpact,
    pub gate_id: Option<GateId>,
    pub affected_fields: Vec<FieldId>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRegenerationResult {
    pub success: bool,
    pub original_commands: Vec<Command>,
    pub regenerated_commands: Vec<Command>,
    pub changes: Vec<PlanChange>,
    pub water_level_changes: Vec<(FieldId, f64, f64)>,
    pub execution_time_adjustment_s: f64,
    pub total_water_adjustment_m3: f64,
    pub error: Option<String>,
}
