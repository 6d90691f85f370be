//! Plan Regenerator — the valve-deficit-based `_regenerate_commands`
//! algorithm, the only one of the two upstream definitions that is
//! not dead code.

use std::collections::HashMap;

use crate::model::{Field, FieldId, GateId};
use crate::plan::{Batch, Command, CommandAction, CommandTarget, Step};

use super::changes::{assess_impact, BatchRegenerationResult, PlanChange, PlanChangeType};

/// Map each field in the batch to the gate that is its inlet, and build the
/// reverse (gate -> controlled fields) index, mirroring
/// `_build_field_to_valve_mapping`/`valve_to_fields`.
fn build_valve_mapping<'a>(
    batch_fields: &[&'a Field],
) -> (HashMap<FieldId, GateId>, HashMap<GateId, Vec<&'a Field>>) {
    let mut field_to_valve = HashMap::new();
    let mut valve_to_fields: HashMap<GateId, Vec<&Field>> = HashMap::new();

    for field in batch_fields {
        field_to_valve.insert(field.id.clone(), field.inlet_gate_id.clone());
        valve_to_fields
            .entry(field.inlet_gate_id.clone())
            .or_default()
            .push(field);
    }

    (field_to_valve, valve_to_fields)
}

/// Re-derive commands for one batch from a fresh reading map, without
/// re-running full planning.
pub fn regenerate_batch(
    batch: &Batch,
    step: &Step,
    batch_fields: &[&Field],
    new_readings: &HashMap<FieldId, f64>,
    rules: &crate::config::RegenerationRules,
) -> BatchRegenerationResult {
    let (_field_to_valve, valve_to_fields) = build_valve_mapping(batch_fields);

    let mut changes = Vec::new();
    let mut water_level_changes = Vec::new();
    let mut regenerated_commands = step.commands.clone();
    let mut total_water_adjustment_m3 = 0.0_f64;
    let mut total_time_adjustment_s = 0.0_f64;

    let original_duration_h = step.t_end_h - step.t_start_h;

    for command in regenerated_commands.iter_mut() {
        let CommandAction::Set = command.action else {
            continue;
        };
        let CommandTarget::Gate(gate_id) = &command.target else {
            continue;
        };
        let Some(controlled_fields) = valve_to_fields.get(gate_id) else {
            continue;
        };

        let mut deficit_sum = 0.0_f64;
        let mut original_deficit_sum = 0.0_f64;
        let mut any_change = false;

        for field in controlled_fields {
            let Some(&new_wl) = new_readings.get(&field.id) else {
                continue;
            };
            let old_wl = field.wl_mm.unwrap_or(new_wl);
            water_level_changes.push((field.id.clone(), old_wl, new_wl));
            any_change = true;

            let original_deficit = (rules.water_level_target_mm - old_wl).max(0.0);
            original_deficit_sum +=
                original_deficit * field.area_mu * crate::config::defaults::M3_PER_MU_PER_MM;

            if new_wl >= rules.water_level_target_mm + rules.water_level_tolerance_mm {
                changes.push(PlanChange {
                    change_type: PlanChangeType::Cancelled,
                    impact: assess_impact(1.0),
                    gate_id: Some(gate_id.clone()),
                    affected_fields: vec![field.id.clone()],
                    description: format!(
                        "field {} reached target+tolerance ({} >= {}), contribution cancelled",
                        field.id,
                        new_wl,
                        rules.water_level_target_mm + rules.water_level_tolerance_mm
                    ),
                });
                continue;
            }

            let deficit = (rules.water_level_target_mm - new_wl).max(0.0);
            deficit_sum += deficit * field.area_mu * crate::config::defaults::M3_PER_MU_PER_MM;
        }

        if !any_change || deficit_sum == original_deficit_sum {
            continue;
        }

        total_water_adjustment_m3 += deficit_sum - original_deficit_sum;

        // Scale duration by how much the deficit moved versus what the step
        // was originally planned for, so unchanged readings yield a 0
        // adjustment (baseline preservation). When the field started at or
        // above target (no planned deficit to compare against), fall back
        // to scaling the fresh deficit against the batch's planned capacity
        // volume.
        let raw_ratio = if original_deficit_sum > 0.0 {
            (deficit_sum - original_deficit_sum) / original_deficit_sum
        } else if deficit_sum > 0.0 && batch.stats.cap_vol_m3 > 0.0 {
            deficit_sum / batch.stats.cap_vol_m3
        } else {
            0.0
        };
        let bounded_ratio = raw_ratio.clamp(
            -rules.max_duration_adjustment_ratio,
            rules.max_duration_adjustment_ratio,
        );

        let new_duration_h = (original_duration_h * (1.0 + bounded_ratio)).clamp(
            rules.min_irrigation_duration_minutes / 60.0,
            rules.max_irrigation_duration_minutes / 60.0,
        );

        let duration_delta_h = new_duration_h - original_duration_h;
        let duration_delta_s = duration_delta_h * 3600.0;
        total_time_adjustment_s += duration_delta_s;

        command.t_end_h = command.t_start_h + new_duration_h;

        changes.push(PlanChange {
            change_type: PlanChangeType::DurationAdjusted,
            impact: assess_impact(bounded_ratio),
            gate_id: Some(gate_id.clone()),
            affected_fields: controlled_fields.iter().map(|f| f.id.clone()).collect(),
            description: format!(
                "duration adjusted from {:.3}h to {:.3}h (deficit {:.2} m3)",
                original_duration_h, new_duration_h, deficit_sum
            ),
        });
    }

    if total_time_adjustment_s.abs() > rules.max_time_adjustment_s
        || total_water_adjustment_m3.abs() > rules.max_water_adjustment_m3
    {
        return BatchRegenerationResult {
            success: false,
            original_commands: step.commands.clone(),
            regenerated_commands: step.commands.clone(),
            changes: Vec::new(),
            water_level_changes,
            execution_time_adjustment_s: 0.0,
            total_water_adjustment_m3: 0.0,
            error: Some(format!(
                "regeneration rejected: time adjustment {:.1}s (max {:.1}s) or water adjustment {:.2}m3 (max {:.2}m3) exceeded",
                total_time_adjustment_s, rules.max_time_adjustment_s,
                total_water_adjustment_m3, rules.max_water_adjustment_m3
            )),
        };
    }

    BatchRegenerationResult {
        success: true,
        original_commands: step.commands.clone(),
        regenerated_commands,
        changes,
        water_level_changes,
        execution_time_adjustment_s: total_time_adjustment_s,
        total_water_adjustment_m3,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldId, GateId, SegmentId};
    use crate::plan::{BatchStats, StepSequence};

    fn field(id: &str, wl: f64, area: f64, gate: &str) -> Field {
        Field {
            id: FieldId::from(id),
            section_id: 1,
            area_mu: area,
            segment_id: SegmentId::from("S1"),
            distance_rank: 0,
            inlet_gate_id: GateId::from(gate),
            wl_mm: Some(wl),
            wl_low: 20.0,
            wl_opt: 60.0,
            wl_high: 90.0,
            has_drain_gate: false,
            rel_to_regulator: 1,
        }
    }

    fn step_with_gate_set(gate: &str, t_start: f64, t_end: f64) -> Step {
        Step {
            label: "batch-1".to_string(),
            t_start_h: t_start,
            t_end_h: t_end,
            commands: vec![Command {
                action: CommandAction::Set,
                target: CommandTarget::Gate(GateId::from(gate)),
                value: Some(100.0),
                t_start_h: t_start,
                t_end_h: t_end,
            }],
            sequence: StepSequence::default(),
            full_order: vec![0],
        }
    }

    fn batch(cap_vol_m3: f64) -> Batch {
        Batch {
            index: 1,
            area_mu: 10.0,
            fields: vec![FieldId::from("F1")],
            stats: BatchStats {
                deficit_vol_m3: 0.0,
                cap_vol_m3,
                eta_hours: 0.5,
            },
        }
    }

    /// Scenario 4 — regenerate on level fall: duration increases.
    #[test]
    fn scenario_4_duration_increases_when_level_falls() {
        let f = field("F1", 40.0, 10.0, "S1-G1");
        let batch_fields = vec![&f];
        let step = step_with_gate_set("S1-G1", 0.0, 0.5);
        let b = batch(6.667);

        let mut readings = HashMap::new();
        readings.insert(FieldId::from("F1"), 35.0);

        let rules = crate::config::RegenerationRules::default();
        let result = regenerate_batch(&b, &step, &batch_fields, &readings, &rules);

        assert!(result.success);
        assert!(result.execution_time_adjustment_s > 0.0);
        assert!(result.total_water_adjustment_m3 > 0.0);
        assert!(result
            .changes
            .iter()
            .any(|c| c.change_type == PlanChangeType::DurationAdjusted));
        let new_duration = result.regenerated_commands[0].t_end_h - result.regenerated_commands[0].t_start_h;
        assert!(new_duration > 0.5);
    }

    #[test]
    fn field_at_exact_target_minus_tolerance_not_cancelled() {
        let rules = crate::config::RegenerationRules::default();
        let boundary_wl = rules.water_level_target_mm - rules.water_level_tolerance_mm;
        let f = field("F1", 40.0, 10.0, "S1-G1");
        let batch_fields = vec![&f];
        let step = step_with_gate_set("S1-G1", 0.0, 0.5);
        let b = batch(6.667);

        let mut readings = HashMap::new();
        readings.insert(FieldId::from("F1"), boundary_wl);

        let result = regenerate_batch(&b, &step, &batch_fields, &readings, &rules);
        assert!(!result
            .changes
            .iter()
            .any(|c| c.change_type == PlanChangeType::Cancelled));
    }

    #[test]
    fn field_reaching_target_plus_tolerance_is_cancelled() {
        let rules = crate::config::RegenerationRules::default();
        let f = field("F1", 40.0, 10.0, "S1-G1");
        let batch_fields = vec![&f];
        let step = step_with_gate_set("S1-G1", 0.0, 0.5);
        let b = batch(6.667);

        let mut readings = HashMap::new();
        readings.insert(
            FieldId::from("F1"),
            rules.water_level_target_mm + rules.water_level_tolerance_mm,
        );

        let result = regenerate_batch(&b, &step, &batch_fields, &readings, &rules);
        assert!(result
            .changes
            .iter()
            .any(|c| c.change_type == PlanChangeType::Cancelled));
    }

    #[test]
    fn baseline_preservation_with_original_readings() {
        let f = field("F1", 40.0, 10.0, "S1-G1");
        let batch_fields = vec![&f];
        let step = step_with_gate_set("S1-G1", 0.0, 0.5);
        let b = batch(6.667);

        let mut readings = HashMap::new();
        readings.insert(FieldId::from("F1"), 40.0);

        let rules = crate::config::RegenerationRules::default();
        let result = regenerate_batch(&b, &step, &batch_fields, &readings, &rules);
        let new_duration = result.regenerated_commands[0].t_end_h - result.regenerated_commands[0].t_start_h;
        assert!((new_duration - 0.5).abs() < 1e-6);
    }

    #[test]
    fn exceeding_bounds_rejects_and_keeps_original_commands() {
        let f = field("F1", 900.0, 10_000.0, "S1-G1");
        let batch_fields = vec![&f];
        let step = step_with_gate_set("S1-G1", 0.0, 0.5);
        let b = batch(6_666.67);

        let mut readings = HashMap::new();
        readings.insert(FieldId::from("F1"), 0.0);

        let mut rules = crate::config::RegenerationRules::default();
        rules.max_water_adjustment_m3 = 1.0;

        let result = regenerate_batch(&b, &step, &batch_fields, &readings, &rules);
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(
            result.regenerated_commands[0].t_end_h,
            result.original_commands[0].t_end_h
        );
    }
}
