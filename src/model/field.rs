//! Field (plot) — the unit of irrigation.

use serde::{Deserialize, Serialize};

use super::ids::{FieldId, GateId, SegmentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    /// Numeric section id — the other of the two id encodings fields carry.
    /// Builder inputs always use `id` (the SGF code); callers convert at
    /// the boundary.
    pub section_id: i64,
    /// Area, mu.
    pub area_mu: f64,
    pub segment_id: SegmentId,
    /// Rank within the owning segment; smaller = further upstream.
    pub distance_rank: i64,
    pub inlet_gate_id: GateId,
    /// Current water level, mm. `None` means "unknown" and excludes the
    /// field from planning.
    pub wl_mm: Option<f64>,
    pub wl_low: f64,
    pub wl_opt: f64,
    pub wl_high: f64,
    pub has_drain_gate: bool,
    /// Position of this field's inlet relative to the segment's regulators,
    /// used by the per-batch regulator rule.
    pub rel_to_regulator: i64,
}

impl Field {
    /// A field is eligible for planning iff its water level is known and is
    /// a finite number (never NaN).
    pub fn has_valid_wl(&self) -> bool {
        matches!(self.wl_mm, Some(v) if v.is_finite())
    }

    /// Deficit in m^3 if below optimum, else 0. `0.666667` m^3/mu/mm is the
    /// per-mu volume constant shared with the Plan Builder.
    pub fn deficit_m3(&self) -> f64 {
        match self.wl_mm {
            Some(wl) if wl < self.wl_opt => {
                (self.wl_opt - wl) * self.area_mu * crate::config::defaults::M3_PER_MU_PER_MM
            }
            _ => 0.0,
        }
    }
}
