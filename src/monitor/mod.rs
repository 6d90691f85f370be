//! Completion Monitor — watches live readings during `executing`
//! batches and emits bottom-up close-inlet/close-regulator/stop-pump
//! commands as fields reach target.

use std::collections::{HashMap, HashSet};

use crate::dispatch::{close_field_inlet, close_regulator, DispatchPhase, QueuedCommand};
use crate::model::{FarmConfig, FieldId, GateId, GateKind};
use crate::plan::Batch;
use crate::waterlevel::WaterLevelStore;

/// Polls the Water-Level Source (via its cached readings in the Store) for
/// the fields of the active batch. Accepts an out-of-cycle manual
/// water-level override, installed by a manual regeneration call, that
/// takes priority until the next live fetch clears it.
#[derive(Debug, Default)]
pub struct CompletionMonitor {
    poll_interval_s: u64,
    overrides: HashMap<FieldId, f64>,
}

/// Outcome of one evaluation pass over a single executing batch.
#[derive(Debug, Default)]
pub struct MonitorTick {
    pub commands: Vec<QueuedCommand>,
    pub batch_fully_done: bool,
}

impl CompletionMonitor {
    pub fn new(poll_interval_s: u64) -> Self {
        Self {
            poll_interval_s,
            overrides: HashMap::new(),
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_s)
    }

    /// Install a manual override for one field, used in place of the
    /// store's latest reading until `clear_overrides` runs.
    pub fn set_override(&mut self, field_id: FieldId, value_mm: f64) {
        self.overrides.insert(field_id, value_mm);
    }

    /// Called once a live fetch has superseded any manual overrides.
    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    fn reading_for(&self, field_id: &FieldId, store: &WaterLevelStore) -> Option<f64> {
        self.overrides
            .get(field_id)
            .copied()
            .or_else(|| store.latest(field_id).map(|r| r.value_mm))
    }

    /// Evaluate one executing batch against current readings.
    ///
    /// `closed_field_inlets` / `closed_regulators` are the BatchExecution's
    /// per-batch bookkeeping of what has already been closed, so a field
    /// bouncing at/above target doesn't re-emit a close command. Both sets
    /// are mutated in place as this batch's closures are decided.
    pub fn evaluate(
        &self,
        farm_config: &FarmConfig,
        store: &WaterLevelStore,
        batch: &Batch,
        tolerance_mm: f64,
        closed_field_inlets: &mut HashSet<FieldId>,
        closed_regulators: &mut HashSet<GateId>,
    ) -> MonitorTick {
        let mut commands = Vec::new();
        let mut newly_done_segments: HashSet<crate::model::SegmentId> = HashSet::new();

        for field_id in &batch.fields {
            if closed_field_inlets.contains(field_id) {
                continue;
            }
            let Some(field) = farm_config.field(field_id) else {
                continue;
            };
            let Some(reading) = self.reading_for(field_id, store) else {
                continue;
            };

            if reading >= field.wl_opt - tolerance_mm {
                commands.push(close_field_inlet(
                    field_id,
                    &field.inlet_gate_id,
                    DispatchPhase::Wrapup,
                ));
                closed_field_inlets.insert(field_id.clone());
                newly_done_segments.insert(field.segment_id.clone());
            }
        }

        // For every segment that gained a newly-closed field this pass,
        // check whether *all* of this batch's fields on that segment are
        // now closed; if so, close the segment's regulator gates.
        for segment_id in newly_done_segments {
            let segment_done = batch
                .fields
                .iter()
                .filter_map(|f| farm_config.field(f))
                .filter(|f| f.segment_id == segment_id)
                .all(|f| closed_field_inlets.contains(&f.id));

            if !segment_done {
                continue;
            }

            let Some(segment) = farm_config.segment(&segment_id) else {
                continue;
            };

            for gate_id in &segment.regulator_gate_ids {
                if closed_regulators.contains(gate_id) {
                    continue;
                }
                let Some(gate) = farm_config.gate(gate_id) else {
                    continue;
                };
                if !matches!(gate.kind, GateKind::MainRegulator | GateKind::BranchRegulator) {
                    continue;
                }
                commands.push(close_regulator(gate_id, DispatchPhase::Wrapup));
                closed_regulators.insert(gate_id.clone());
            }
        }

        let batch_fully_done = batch.fields.iter().all(|f| closed_field_inlets.contains(f));

        MonitorTick {
            commands,
            batch_fully_done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Gate, Pump, Segment, SegmentId, SegmentKind};
    use crate::plan::BatchStats;
    use crate::waterlevel::{ReadingQuality, ReadingSource, WaterLevelReading};

    fn farm_with_two_fields() -> FarmConfig {
        FarmConfig {
            farm_id: "F1".to_string(),
            t_win_h: 20.0,
            d_target_mm: 90.0,
            pumps: vec![Pump {
                id: crate::model::PumpId::from("P1"),
                q_rated_m3ph: 200.0,
                efficiency: 0.9,
                power_kw: 15.0,
                electricity_price: 1.2,
            }],
            segments: vec![Segment {
                id: SegmentId::from("S1"),
                canal_id: "C1".to_string(),
                distance_rank: 0,
                kind: SegmentKind::Main,
                regulator_gate_ids: vec![GateId::from("S1-G1")],
                feed_by: vec![],
            }],
            gates: vec![Gate {
                id: GateId::from("S1-G1"),
                kind: GateKind::MainRegulator,
                q_max_m3ph: 500.0,
            }],
            fields: vec![
                Field {
                    id: FieldId::from("F1"),
                    section_id: 1,
                    area_mu: 10.0,
                    segment_id: SegmentId::from("S1"),
                    distance_rank: 0,
                    inlet_gate_id: GateId::from("S1-G2"),
                    wl_mm: Some(40.0),
                    wl_low: 20.0,
                    wl_opt: 60.0,
                    wl_high: 90.0,
                    has_drain_gate: false,
                    rel_to_regulator: 1,
                },
                Field {
                    id: FieldId::from("F2"),
                    section_id: 2,
                    area_mu: 10.0,
                    segment_id: SegmentId::from("S1"),
                    distance_rank: 1,
                    inlet_gate_id: GateId::from("S1-G3"),
                    wl_mm: Some(40.0),
                    wl_low: 20.0,
                    wl_opt: 60.0,
                    wl_high: 90.0,
                    has_drain_gate: false,
                    rel_to_regulator: 2,
                },
            ],
            active_pump_ids: vec![crate::model::PumpId::from("P1")],
            allowed_zone_segment_ids: None,
            quality_thresholds: crate::config::QualityThresholds::default(),
            regeneration_rules: crate::config::RegenerationRules::default(),
        }
    }

    fn reading(field: &str, value: f64) -> WaterLevelReading {
        WaterLevelReading {
            field_id: FieldId::from(field),
            value_mm: value,
            timestamp: chrono::Utc::now(),
            source: ReadingSource::Api,
            quality: ReadingQuality::Invalid,
            confidence: 0.9,
            provenance: serde_json::Value::Null,
        }
    }

    fn batch() -> Batch {
        Batch {
            index: 1,
            area_mu: 20.0,
            fields: vec![FieldId::from("F1"), FieldId::from("F2")],
            stats: BatchStats {
                deficit_vol_m3: 0.0,
                cap_vol_m3: 10.0,
                eta_hours: 1.0,
            },
        }
    }

    /// Scenario 5 — bottom-up close: field inlets first, then regulator
    /// once every field on the segment is done.
    #[test]
    fn scenario_5_bottom_up_close_on_segment_completion() {
        let farm = farm_with_two_fields();
        let mut store = WaterLevelStore::new();
        let thresholds = crate::config::QualityThresholds::default();
        store.add(reading("F1", 60.0), &thresholds);
        store.add(reading("F2", 40.0), &thresholds);

        let monitor = CompletionMonitor::new(15);
        let mut closed_fields = HashSet::new();
        let mut closed_regulators = HashSet::new();

        let tick = monitor.evaluate(
            &farm,
            &store,
            &batch(),
            5.0,
            &mut closed_fields,
            &mut closed_regulators,
        );

        assert_eq!(tick.commands.len(), 1);
        assert!(!tick.batch_fully_done);
        assert!(closed_fields.contains(&FieldId::from("F1")));
        assert!(closed_regulators.is_empty());

        store.add(reading("F2", 60.0), &thresholds);
        let tick = monitor.evaluate(
            &farm,
            &store,
            &batch(),
            5.0,
            &mut closed_fields,
            &mut closed_regulators,
        );

        assert_eq!(tick.commands.len(), 2);
        assert!(tick.batch_fully_done);
        assert!(closed_regulators.contains(&GateId::from("S1-G1")));
    }

    #[test]
    fn override_takes_priority_over_store_reading() {
        let farm = farm_with_two_fields();
        let mut store = WaterLevelStore::new();
        let thresholds = crate::config::QualityThresholds::default();
        store.add(reading("F1", 10.0), &thresholds);

        let mut monitor = CompletionMonitor::new(15);
        monitor.set_override(FieldId::from("F1"), 65.0);

        let mut closed_fields = HashSet::new();
        let mut closed_regulators = HashSet::new();
        let single_field_batch = Batch {
            index: 1,
            area_mu: 10.0,
            fields: vec![FieldId::from("F1")],
            stats: BatchStats {
                deficit_vol_m3: 0.0,
                cap_vol_m3: 10.0,
                eta_hours: 1.0,
            },
        };
        let tick = monitor.evaluate(
            &farm,
            &store,
            &single_field_batch,
            5.0,
            &mut closed_fields,
            &mut closed_regulators,
        );
        assert!(closed_fields.contains(&FieldId::from("F1")));
        assert_eq!(tick.commands.len(), 1);
    }
}
