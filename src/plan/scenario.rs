//! Multi-Scenario Builder — runs the Plan Builder once per pump
//! subset that meets the eligibility threshold, then compares the results.

use rayon::prelude::*;
use serde::Serialize;

use crate::model::{FarmConfig, PumpId};
use crate::waterlevel::WaterLevelStore;

use super::builder::{build_plan, ReadingResolutionMode};
use super::error::PlanBuildError;
use super::types::Plan;

#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub scenario_name: String,
    pub plan: Plan,
    pub coverage_segments: usize,
    pub coverage_segments_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioComparison {
    pub scenarios: Vec<Scenario>,
    pub min_cost_scenario: Option<String>,
    pub min_time_scenario: Option<String>,
    pub balanced_scenario: Option<String>,
}

/// Enumerate meaningful pump subsets: each single pump, then the full
/// combination of every pump in `farm_config.pumps`.
fn pump_subsets(farm_config: &FarmConfig) -> Vec<(String, Vec<PumpId>)> {
    let mut subsets = Vec::new();
    for pump in &farm_config.pumps {
        subsets.push((format!("single-{}", pump.id), vec![pump.id.clone()]));
    }
    if farm_config.pumps.len() > 1 {
        subsets.push((
            "all-pumps".to_string(),
            farm_config.pumps.iter().map(|p| p.id.clone()).collect(),
        ));
    }
    subsets
}

/// Build and compare plans across pump subsets. Only subsets whose
/// resulting plan covers at least `trigger_threshold` eligible fields are
/// kept.
pub fn build_scenarios(
    farm_config: &FarmConfig,
    trigger_threshold: usize,
    mode: ReadingResolutionMode,
    store: Option<&WaterLevelStore>,
) -> Result<ScenarioComparison, PlanBuildError> {
    let subsets = pump_subsets(farm_config);
    let total_segments = farm_config.segments.len();

    let built: Vec<Result<Option<Scenario>, PlanBuildError>> = subsets
        .into_par_iter()
        .map(|(name, active_pumps)| {
            let mut cfg = farm_config.clone();
            cfg.active_pump_ids = active_pumps;
            let plan = build_plan(&cfg, mode, store, None)?;

            let eligible_field_count: usize = plan.batches.iter().map(|b| b.fields.len()).sum();
            if eligible_field_count < trigger_threshold {
                return Ok(None);
            }

            let covered_segments = plan
                .batches
                .iter()
                .flat_map(|b| b.fields.iter())
                .filter_map(|field_id| cfg.field(field_id))
                .map(|f| f.segment_id.clone())
                .collect::<std::collections::HashSet<_>>()
                .len();

            Ok(Some(Scenario {
                scenario_name: name,
                plan,
                coverage_segments: covered_segments,
                coverage_segments_total: total_segments,
            }))
        })
        .collect();

    let mut scenarios = Vec::new();
    for result in built {
        if let Some(scenario) = result? {
            scenarios.push(scenario);
        }
    }
    // `into_par_iter` does not preserve input order; make the result
    // deterministic regardless of scheduling.
    scenarios.sort_by(|a, b| a.scenario_name.cmp(&b.scenario_name));

    let min_cost_scenario = scenarios
        .iter()
        .min_by(|a, b| {
            a.plan
                .totals
                .total_electricity_cost
                .partial_cmp(&b.plan.totals.total_electricity_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|s| s.scenario_name.clone());

    let min_time_scenario = scenarios
        .iter()
        .min_by(|a, b| {
            a.plan
                .totals
                .total_eta_h
                .partial_cmp(&b.plan.totals.total_eta_h)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|s| s.scenario_name.clone());

    let balanced_scenario = balanced_pick(&scenarios);

    Ok(ScenarioComparison {
        scenarios,
        min_cost_scenario,
        min_time_scenario,
        balanced_scenario,
    })
}

/// Normalized cost+time average: each metric is min-max normalized across
/// the scenario set, then averaged; the lowest combined score wins.
fn balanced_pick(scenarios: &[Scenario]) -> Option<String> {
    if scenarios.is_empty() {
        return None;
    }

    let costs: Vec<f64> = scenarios
        .iter()
        .map(|s| s.plan.totals.total_electricity_cost)
        .collect();
    let times: Vec<f64> = scenarios.iter().map(|s| s.plan.totals.total_eta_h).collect();

    let (cost_min, cost_max) = min_max(&costs);
    let (time_min, time_max) = min_max(&times);

    let normalize = |v: f64, lo: f64, hi: f64| -> f64 {
        if (hi - lo).abs() < 1e-12 {
            0.0
        } else {
            (v - lo) / (hi - lo)
        }
    };

    scenarios
        .iter()
        .min_by(|a, b| {
            let score_a = (normalize(a.plan.totals.total_electricity_cost, cost_min, cost_max)
                + normalize(a.plan.totals.total_eta_h, time_min, time_max))
                / 2.0;
            let score_b = (normalize(b.plan.totals.total_electricity_cost, cost_min, cost_max)
                + normalize(b.plan.totals.total_eta_h, time_min, time_max))
                / 2.0;
            score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|s| s.scenario_name.clone())
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}
