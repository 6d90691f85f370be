//! Plan data model — Batch, Step, Command, Plan and their supporting
//! projections, matching the documented JSON output shape field for
//! field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{FieldId, GateId, PumpId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Start,
    Stop,
    Open,
    Close,
    Set,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTarget {
    Pump(PumpId),
    Gate(GateId),
    Field(FieldId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: CommandAction,
    pub target: CommandTarget,
    /// E.g. open percent for `set`.
    #[serde(default)]
    pub value: Option<f64>,
    pub t_start_h: f64,
    pub t_end_h: f64,
}

/// The structured projection of one step's commands, grouped by role, used
/// by the executor to enforce ordering (pumps-on -> regulators -> inlets ->
/// pumps-off).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSequence {
    pub pumps_on: Vec<PumpId>,
    pub gates_open: Vec<GateId>,
    pub gates_set: Vec<(GateId, f64)>,
    pub fields: Vec<FieldId>,
    pub pumps_off: Vec<PumpId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub label: String,
    pub t_start_h: f64,
    pub t_end_h: f64,
    pub commands: Vec<Command>,
    pub sequence: StepSequence,
    /// Interleaving of `commands` in dispatch order, as indices into
    /// `commands`.
    pub full_order: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    pub deficit_vol_m3: f64,
    pub cap_vol_m3: f64,
    pub eta_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based.
    pub index: usize,
    pub area_mu: f64,
    pub fields: Vec<FieldId>,
    pub stats: BatchStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCalc {
    pub a_cover_mu: f64,
    pub q_avail_m3ph: f64,
    pub t_win_h: f64,
    pub d_target_mm: f64,
    pub active_pumps: Vec<PumpId>,
    pub skipped_null_wl_count: usize,
    pub skipped_null_wl_fields: Vec<FieldId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanTotals {
    pub total_eta_h: f64,
    pub total_deficit_m3: f64,
    pub total_pump_runtime_hours: HashMap<String, f64>,
    pub total_electricity_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub calc: PlanCalc,
    pub batches: Vec<Batch>,
    pub steps: Vec<Step>,
    pub totals: PlanTotals,
}

impl Plan {
    /// A well-formed empty plan for the zero-eligible-fields failure
    /// condition — never an error, always a structurally valid plan.
    pub fn empty(
        q_avail_m3ph: f64,
        t_win_h: f64,
        d_target_mm: f64,
        a_cover_mu: f64,
        active_pumps: Vec<PumpId>,
        skipped_null_wl_fields: Vec<FieldId>,
    ) -> Self {
        let skipped_null_wl_count = skipped_null_wl_fields.len();
        Self {
            calc: PlanCalc {
                a_cover_mu,
                q_avail_m3ph,
                t_win_h,
                d_target_mm,
                active_pumps,
                skipped_null_wl_count,
                skipped_null_wl_fields,
            },
            batches: Vec::new(),
            steps: Vec::new(),
            totals: PlanTotals::default(),
        }
    }
}
