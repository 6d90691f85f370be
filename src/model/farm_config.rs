//! FarmConfig — an immutable snapshot aggregating the whole Farm Model plus
//! global planning parameters.

use serde::{Deserialize, Serialize};

use super::field::Field;
use super::gate::Gate;
use super::ids::PumpId;
use super::pump::Pump;
use super::segment::Segment;
use crate::config::{QualityThresholds, RegenerationRules};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmConfig {
    pub farm_id: String,
    /// Planning time window, hours.
    pub t_win_h: f64,
    /// Target irrigation depth, mm.
    pub d_target_mm: f64,
    pub pumps: Vec<Pump>,
    pub segments: Vec<Segment>,
    pub gates: Vec<Gate>,
    pub fields: Vec<Field>,
    /// Ids of pumps currently switched on for planning purposes.
    pub active_pump_ids: Vec<PumpId>,
    /// Optional allow-list of segment ids; when present, only these
    /// segments (after reachability) are eligible.
    #[serde(default)]
    pub allowed_zone_segment_ids: Option<Vec<String>>,

    /// Thresholds shared with the Water-Level Store/Source, threaded
    /// through `FarmConfig` so every component reads one source of
    /// tunables instead of hardcoding them.
    #[serde(default)]
    pub quality_thresholds: QualityThresholds,
    #[serde(default)]
    pub regeneration_rules: RegenerationRules,
}

impl FarmConfig {
    pub fn active_pumps(&self) -> Vec<&Pump> {
        self.pumps
            .iter()
            .filter(|p| self.active_pump_ids.contains(&p.id))
            .collect()
    }

    pub fn effective_flow_m3ph(&self) -> f64 {
        self.active_pumps().iter().map(|p| p.effective_flow()).sum()
    }

    pub fn per_mu_m3(&self) -> f64 {
        crate::config::defaults::M3_PER_MU_PER_MM * self.d_target_mm
    }

    pub fn segment(&self, id: &super::ids::SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    pub fn field(&self, id: &super::ids::FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn gate(&self, id: &super::ids::GateId) -> Option<&Gate> {
        self.gates.iter().find(|g| &g.id == id)
    }

    pub fn pump(&self, id: &PumpId) -> Option<&Pump> {
        self.pumps.iter().find(|p| &p.id == id)
    }
}
