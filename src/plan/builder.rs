//! Plan Builder — the algorithmic core. Purely synchronous, no I/O.

use std::collections::HashMap;

use crate::model::{parse_gate_id, FarmConfig, Field, FieldId, GateKind, Pump, PumpId, Segment};
use crate::waterlevel::WaterLevelStore;

use super::error::PlanBuildError;
use super::types::{
    Batch, BatchStats, Command, CommandAction, CommandTarget, Plan, PlanCalc, PlanTotals, Step,
    StepSequence,
};

/// Whether the Builder should prefer live water-level readings from the
/// Store over the statically configured `field.wl_mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingResolutionMode {
    /// Look up `store.latest(field)` first, falling back to `field.wl_mm`.
    UseRealtime,
    /// Always use `field.wl_mm` as configured, ignoring the store.
    PurelyConfigured,
}

/// Resolve one field's water level under the given mode.
fn resolve_wl(
    field: &Field,
    mode: ReadingResolutionMode,
    store: Option<&WaterLevelStore>,
) -> Option<f64> {
    match mode {
        ReadingResolutionMode::UseRealtime => store
            .and_then(|s| s.latest(&field.id))
            .map(|r| r.value_mm)
            .or(field.wl_mm),
        ReadingResolutionMode::PurelyConfigured => field.wl_mm,
    }
}

struct EligibleField<'a> {
    field: &'a Field,
    segment: &'a Segment,
    wl_mm: f64,
}

/// Build an irrigation plan for the given farm config and active pump
/// subset, implementing the capacity, eligibility, batching, regulator-rule, timing and command-emission steps.
pub fn build_plan(
    farm_config: &FarmConfig,
    mode: ReadingResolutionMode,
    store: Option<&WaterLevelStore>,
    allowed_zone_segment_ids: Option<&[String]>,
) -> Result<Plan, PlanBuildError> {
    // Step 1: effective capacity.
    let active_pumps: Vec<&Pump> = farm_config.active_pumps();
    for id in &farm_config.active_pump_ids {
        if farm_config.pump(id).is_none() {
            return Err(PlanBuildError::UnknownActivePump(id.as_str().to_string()));
        }
    }
    let q_avail = active_pumps.iter().map(|p| p.effective_flow()).sum::<f64>();
    let per_mu_m3 = farm_config.per_mu_m3();
    let a_cover_mu = if per_mu_m3 > 0.0 {
        q_avail * farm_config.t_win_h / per_mu_m3
    } else {
        0.0
    };
    let active_pump_ids: Vec<PumpId> = active_pumps.iter().map(|p| p.id.clone()).collect();

    let allowed_zones = allowed_zone_segment_ids.map(|zones| zones.to_vec());

    // Step 2/3: reachability + eligibility.
    let mut eligible: Vec<EligibleField> = Vec::new();
    let mut skipped_null_wl_fields: Vec<FieldId> = Vec::new();

    for field in &farm_config.fields {
        let segment = match farm_config.segment(&field.segment_id) {
            Some(s) => s,
            None => {
                return Err(PlanBuildError::DanglingSegmentReference(
                    field.id.as_str().to_string(),
                    field.segment_id.as_str().to_string(),
                ))
            }
        };

        let reachable = segment.is_reachable(&active_pump_ids)
            && allowed_zones
                .as_ref()
                .map(|zones| zones.iter().any(|z| z == segment.id.as_str()))
                .unwrap_or(true);

        if !reachable {
            continue;
        }

        match resolve_wl(field, mode, store) {
            Some(wl) if wl.is_finite() => eligible.push(EligibleField {
                field,
                segment,
                wl_mm: wl,
            }),
            _ => skipped_null_wl_fields.push(field.id.clone()),
        }
    }

    if eligible.is_empty() {
        return Ok(Plan::empty(
            q_avail,
            farm_config.t_win_h,
            farm_config.d_target_mm,
            a_cover_mu,
            active_pump_ids,
            skipped_null_wl_fields,
        ));
    }

    // Step 4: stable sort by (segment.distance_rank, field.distance_rank, field.id).
    eligible.sort_by(|a, b| {
        (a.segment.distance_rank, a.field.distance_rank, a.field.id.as_str()).cmp(&(
            b.segment.distance_rank,
            b.field.distance_rank,
            b.field.id.as_str(),
        ))
    });

    // Step 5: greedy batching by area.
    let mut batches_fields: Vec<Vec<&Field>> = Vec::new();
    let mut current: Vec<&Field> = Vec::new();
    let mut current_area = 0.0_f64;

    for ef in &eligible {
        if !current.is_empty() && current_area + ef.field.area_mu > a_cover_mu {
            batches_fields.push(std::mem::take(&mut current));
            current_area = 0.0;
        }
        current_area += ef.field.area_mu;
        current.push(ef.field);
    }
    if !current.is_empty() {
        batches_fields.push(current);
    }

    let mut batches = Vec::with_capacity(batches_fields.len());
    let mut steps = Vec::with_capacity(batches_fields.len());
    let mut cumulative_t = 0.0_f64;
    let mut total_pump_runtime: HashMap<String, f64> = HashMap::new();
    let mut total_deficit = 0.0_f64;
    let mut total_cost = 0.0_f64;

    for (i, fields) in batches_fields.into_iter().enumerate() {
        let index = i + 1;
        let batch_area: f64 = fields.iter().map(|f| f.area_mu).sum();
        let deficit_vol_m3: f64 = fields.iter().map(|f| f.deficit_m3()).sum();
        let cap_vol_m3 = batch_area * per_mu_m3;

        // Step 7: timing.
        let eta = if q_avail > 0.0 {
            batch_area * per_mu_m3 / q_avail
        } else {
            0.0
        };
        let t_start = cumulative_t;
        let t_end = t_start + eta;
        cumulative_t = t_end;

        // Step 6: per-batch regulator rule.
        let batch_field_ids: Vec<FieldId> = fields.iter().map(|f| f.id.clone()).collect();
        let gate_commands = regulator_commands(farm_config, &fields, t_start, t_end)?;

        // Step 8: commands per step.
        let mut commands: Vec<Command> = Vec::new();
        let mut full_order = Vec::new();

        for pump_id in &active_pump_ids {
            commands.push(Command {
                action: CommandAction::Start,
                target: CommandTarget::Pump(pump_id.clone()),
                value: None,
                t_start_h: t_start,
                t_end_h: t_end,
            });
            full_order.push(commands.len() - 1);
        }

        for (gate_id, open_pct) in &gate_commands {
            commands.push(Command {
                action: CommandAction::Set,
                target: CommandTarget::Gate(gate_id.clone()),
                value: Some(*open_pct),
                t_start_h: t_start,
                t_end_h: t_end,
            });
            full_order.push(commands.len() - 1);
        }

        // Declarative bracket only: this documents the step's planned
        // pump-off the same way its pump-on is documented above, but the
        // Batch Scheduler is the sole actual owner of pump shutdown timing.
        // It suppresses this command from live dispatch and only stops a
        // pump once the Completion Monitor confirms every batch using it
        // has finished, so a pump shared across batches isn't stopped and
        // restarted between them.
        for pump_id in active_pump_ids.iter().rev() {
            commands.push(Command {
                action: CommandAction::Stop,
                target: CommandTarget::Pump(pump_id.clone()),
                value: None,
                t_start_h: t_start,
                t_end_h: t_end,
            });
            full_order.push(commands.len() - 1);
        }

        let sequence = StepSequence {
            pumps_on: active_pump_ids.clone(),
            gates_open: Vec::new(),
            gates_set: gate_commands,
            fields: batch_field_ids.clone(),
            pumps_off: active_pump_ids.iter().rev().cloned().collect(),
        };

        steps.push(Step {
            label: format!("batch-{index}"),
            t_start_h: t_start,
            t_end_h: t_end,
            commands,
            sequence,
            full_order,
        });

        for pump_id in &active_pump_ids {
            *total_pump_runtime
                .entry(pump_id.as_str().to_string())
                .or_insert(0.0) += eta;
        }
        total_deficit += deficit_vol_m3;

        batches.push(Batch {
            index,
            area_mu: batch_area,
            fields: batch_field_ids,
            stats: BatchStats {
                deficit_vol_m3,
                cap_vol_m3,
                eta_hours: eta,
            },
        });
    }

    for pump in &active_pumps {
        let runtime = total_pump_runtime
            .get(pump.id.as_str())
            .copied()
            .unwrap_or(0.0);
        total_cost += runtime * pump.power_kw * pump.electricity_price;
    }

    let totals = PlanTotals {
        total_eta_h: cumulative_t,
        total_deficit_m3: total_deficit,
        total_pump_runtime_hours: total_pump_runtime,
        total_electricity_cost: total_cost,
    };

    Ok(Plan {
        calc: PlanCalc {
            a_cover_mu,
            q_avail_m3ph: q_avail,
            t_win_h: farm_config.t_win_h,
            d_target_mm: farm_config.d_target_mm,
            active_pumps: active_pump_ids,
            skipped_null_wl_count: skipped_null_wl_fields.len(),
            skipped_null_wl_fields,
        },
        batches,
        steps,
        totals,
    })
}

/// for every segment touching this batch, compute the open/close
/// percent of its regulator gates.
fn regulator_commands(
    farm_config: &FarmConfig,
    batch_fields: &[&Field],
    _t_start: f64,
    _t_end: f64,
) -> Result<Vec<(crate::model::GateId, f64)>, PlanBuildError> {
    let mut commands = Vec::new();

    let touched_segment_ids: Vec<_> = farm_config
        .segments
        .iter()
        .filter(|s| {
            batch_fields.iter().any(|f| f.segment_id == s.id)
                || s.regulator_gate_ids.iter().any(|g| {
                    farm_config
                        .gate(g)
                        .map(|gate| gate.kind == GateKind::MainRegulator)
                        .unwrap_or(false)
                })
        })
        .map(|s| s.id.clone())
        .collect();

    for segment_id in touched_segment_ids {
        let segment = farm_config.segment(&segment_id).expect("segment just looked up by id");

        for gate_id in &segment.regulator_gate_ids {
            let gate = match farm_config.gate(gate_id) {
                Some(g) => g,
                None => continue,
            };
            if !gate.kind.is_regulator() {
                continue;
            }

            let (_, k) = parse_gate_id(gate_id)
                .map_err(|_| PlanBuildError::DanglingSegmentReference(gate_id.to_string(), segment_id.to_string()))?;

            let open = match gate.kind {
                GateKind::MainRegulator => batch_fields.iter().any(|f| {
                    if f.segment_id != segment_id {
                        if let Ok((_, inlet_seq)) = parse_gate_id(&f.inlet_gate_id) {
                            return inlet_seq <= k;
                        }
                    }
                    false
                }),
                GateKind::BranchRegulator => batch_fields.iter().any(|f| {
                    if f.segment_id == segment_id {
                        if let Ok((_, inlet_seq)) = parse_gate_id(&f.inlet_gate_id) {
                            return inlet_seq >= k;
                        }
                    }
                    false
                }),
                _ => false,
            };

            commands.push((gate_id.clone(), if open { 100.0 } else { 0.0 }));
        }
    }

    commands.sort_by(|a, b| {
        let ka = parse_gate_id(&a.0).map(|(_, k)| k).unwrap_or(0);
        let kb = parse_gate_id(&b.0).map(|(_, k)| k).unwrap_or(0);
        ka.cmp(&kb)
    });

    Ok(commands)
}
